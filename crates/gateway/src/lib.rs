#![deny(unsafe_code)]

/// Client for the hosted data gateway: GraphQL operations over HTTP and the
/// live message feed over `graphql-transport-ws`.
pub mod error;
pub mod feed;
pub mod graphql;
/// Typed identifiers shared across gateway operations.
pub mod ids;
pub mod types;

pub use error::{GatewayError, GatewayResult};
pub use feed::{
    FeedEvent, FeedEventPayload, FeedEventStream, FeedHandle, FeedSessionId, FeedTarget,
    FeedWorker, MessageFeedClient,
};
pub use graphql::GraphqlClient;
pub use ids::{ChatId, MessageId};
pub use types::{ChatRecord, MessageRecord, normalize_messages};
