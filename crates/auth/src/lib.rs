#![deny(unsafe_code)]

/// Client for an nhost-style identity session provider.
pub mod client;
pub mod error;
/// Session and user wire types.
pub mod types;

pub use client::AuthClient;
pub use error::{AuthError, AuthResult};
pub use types::{Session, User};
