use std::future::Future;
use std::pin::Pin;

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::connect_async;

use crate::ids::ChatId;
use crate::types::MessageRecord;

/// Single in-flight subscription id on the socket; one feed per socket.
const FEED_OPERATION_ID: &str = "1";
const WS_SUBPROTOCOL: &str = "graphql-transport-ws";

pub(crate) const MESSAGE_FEED: &str = r#"
subscription OnMessageAdded($chatId: uuid!) {
  messages(
    where: { chat_id: { _eq: $chatId } }
    order_by: { created_at: asc }
  ) {
    id
    user_id
    content
    created_at
    is_bot
  }
}
"#;

/// Identifier for one feed activation.
///
/// This must change on every activation so stale snapshots can be rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeedSessionId(pub u64);

impl FeedSessionId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Feed routing key used for stale-snapshot rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FeedTarget {
    pub chat_id: ChatId,
    pub session_id: FeedSessionId,
}

impl FeedTarget {
    pub const fn new(chat_id: ChatId, session_id: FeedSessionId) -> Self {
        Self {
            chat_id,
            session_id,
        }
    }
}

/// Payload of one feed delivery.
///
/// Every `Snapshot` is the full ordered message set of the chat; the gateway
/// uses live-query semantics rather than row deltas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEventPayload {
    Snapshot(Vec<MessageRecord>),
    Error(String),
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEvent {
    pub target: FeedTarget,
    pub payload: FeedEventPayload,
}

/// Socket side of one feed; runs until cancelled or terminal.
pub type FeedWorker = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Consumer side of one feed.
///
/// Dropping the stream drops the cancel sender, which resolves the worker's
/// cancellation branch and closes the socket.
pub struct FeedEventStream {
    target: FeedTarget,
    rx: mpsc::UnboundedReceiver<FeedEvent>,
    _cancel_tx: oneshot::Sender<()>,
}

impl FeedEventStream {
    pub fn target(&self) -> FeedTarget {
        self.target
    }

    pub async fn recv(&mut self) -> Option<FeedEvent> {
        self.rx.recv().await
    }
}

pub struct FeedHandle {
    pub stream: FeedEventStream,
    pub worker: FeedWorker,
}

pub(crate) fn make_feed_stream(
    target: FeedTarget,
) -> (
    mpsc::UnboundedSender<FeedEvent>,
    FeedEventStream,
    oneshot::Receiver<()>,
) {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (cancel_tx, cancel_rx) = oneshot::channel();

    let stream = FeedEventStream {
        target,
        rx: event_rx,
        _cancel_tx: cancel_tx,
    };

    (event_tx, stream, cancel_rx)
}

/// Opens live message feeds over `graphql-transport-ws`.
pub struct MessageFeedClient {
    ws_endpoint: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerFrame {
    ConnectionAck {},
    Next { id: String, payload: NextPayload },
    Error {
        id: String,
        #[serde(default)]
        payload: serde_json::Value,
    },
    Complete { id: String },
    Ping {},
    Pong {},
}

#[derive(Debug, Deserialize)]
struct NextPayload {
    data: Option<MessagesData>,
    #[serde(default)]
    errors: Vec<NextError>,
}

#[derive(Debug, Deserialize)]
struct NextError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct MessagesData {
    messages: Vec<MessageRecord>,
}

impl NextPayload {
    fn into_snapshot(self) -> Result<Vec<MessageRecord>, String> {
        if !self.errors.is_empty() {
            let message = self
                .errors
                .iter()
                .map(|entry| entry.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(message);
        }

        self.data
            .map(|data| data.messages)
            .ok_or_else(|| "feed delivery carried no data".to_string())
    }
}

impl MessageFeedClient {
    pub fn new(ws_endpoint: impl Into<String>) -> Self {
        Self {
            ws_endpoint: ws_endpoint.into(),
        }
    }

    pub fn ws_endpoint(&self) -> &str {
        &self.ws_endpoint
    }

    /// Opens one feed for `target`. The returned worker must be spawned on a
    /// tokio runtime; events arrive on the stream.
    pub fn open_feed(&self, access_token: &str, target: FeedTarget) -> FeedHandle {
        let (event_tx, stream, cancel_rx) = make_feed_stream(target);
        let worker: FeedWorker = Box::pin(run_feed_worker(
            self.ws_endpoint.clone(),
            access_token.to_string(),
            target,
            event_tx,
            cancel_rx,
        ));

        FeedHandle { stream, worker }
    }
}

fn emit(tx: &mpsc::UnboundedSender<FeedEvent>, target: FeedTarget, payload: FeedEventPayload) {
    let _ = tx.send(FeedEvent { target, payload });
}

fn connection_init_frame(access_token: &str) -> String {
    serde_json::json!({
        "type": "connection_init",
        "payload": {
            "headers": { "Authorization": format!("Bearer {access_token}") }
        }
    })
    .to_string()
}

fn subscribe_frame(chat_id: ChatId) -> String {
    serde_json::json!({
        "type": "subscribe",
        "id": FEED_OPERATION_ID,
        "payload": {
            "query": MESSAGE_FEED,
            "variables": { "chatId": chat_id }
        }
    })
    .to_string()
}

fn pong_frame() -> String {
    serde_json::json!({ "type": "pong" }).to_string()
}

async fn run_feed_worker(
    ws_endpoint: String,
    access_token: String,
    target: FeedTarget,
    event_tx: mpsc::UnboundedSender<FeedEvent>,
    mut cancel_rx: oneshot::Receiver<()>,
) {
    let mut request = match ws_endpoint.as_str().into_client_request() {
        Ok(request) => request,
        Err(error) => {
            tracing::error!(%ws_endpoint, %error, "invalid feed endpoint");
            emit(&event_tx, target, FeedEventPayload::Error(error.to_string()));
            return;
        }
    };
    request.headers_mut().insert(
        "Sec-WebSocket-Protocol",
        HeaderValue::from_static(WS_SUBPROTOCOL),
    );

    let (ws_stream, _) = match connect_async(request).await {
        Ok(connected) => connected,
        Err(error) => {
            tracing::error!(?target, %error, "failed to connect message feed");
            emit(&event_tx, target, FeedEventPayload::Error(error.to_string()));
            return;
        }
    };
    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    if let Err(error) = ws_tx
        .send(WsMessage::Text(connection_init_frame(&access_token)))
        .await
    {
        emit(&event_tx, target, FeedEventPayload::Error(error.to_string()));
        return;
    }

    let mut subscribed = false;

    loop {
        tokio::select! {
            _ = &mut cancel_rx => {
                // Cancelled by the consumer; close quietly with no terminal event.
                tracing::debug!(?target, "message feed cancelled");
                let _ = ws_tx.send(WsMessage::Close(None)).await;
                return;
            }
            frame = ws_rx.next() => {
                match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        let parsed = match serde_json::from_str::<ServerFrame>(&text) {
                            Ok(parsed) => parsed,
                            Err(error) => {
                                tracing::debug!(?target, %error, "skipping unrecognized feed frame");
                                continue;
                            }
                        };

                        match parsed {
                            ServerFrame::ConnectionAck {} => {
                                if !subscribed {
                                    subscribed = true;
                                    if let Err(error) = ws_tx
                                        .send(WsMessage::Text(subscribe_frame(target.chat_id)))
                                        .await
                                    {
                                        emit(
                                            &event_tx,
                                            target,
                                            FeedEventPayload::Error(error.to_string()),
                                        );
                                        return;
                                    }
                                }
                            }
                            ServerFrame::Next { id, payload } => {
                                if id != FEED_OPERATION_ID {
                                    continue;
                                }
                                match payload.into_snapshot() {
                                    Ok(messages) => {
                                        if event_tx
                                            .send(FeedEvent {
                                                target,
                                                payload: FeedEventPayload::Snapshot(messages),
                                            })
                                            .is_err()
                                        {
                                            return;
                                        }
                                    }
                                    Err(message) => {
                                        emit(&event_tx, target, FeedEventPayload::Error(message));
                                        return;
                                    }
                                }
                            }
                            ServerFrame::Error { id, payload } => {
                                if id == FEED_OPERATION_ID {
                                    emit(
                                        &event_tx,
                                        target,
                                        FeedEventPayload::Error(payload.to_string()),
                                    );
                                    return;
                                }
                            }
                            ServerFrame::Complete { id } => {
                                if id == FEED_OPERATION_ID {
                                    emit(&event_tx, target, FeedEventPayload::Completed);
                                    return;
                                }
                            }
                            ServerFrame::Ping {} => {
                                let _ = ws_tx.send(WsMessage::Text(pong_frame())).await;
                            }
                            ServerFrame::Pong {} => {}
                        }
                    }
                    Some(Ok(WsMessage::Ping(data))) => {
                        let _ = ws_tx.send(WsMessage::Pong(data)).await;
                    }
                    Some(Ok(WsMessage::Close(_))) | None => {
                        emit(
                            &event_tx,
                            target,
                            FeedEventPayload::Error("feed connection closed".to_string()),
                        );
                        return;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        tracing::warn!(?target, %error, "message feed socket error");
                        emit(&event_tx, target, FeedEventPayload::Error(error.to_string()));
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn target() -> FeedTarget {
        FeedTarget::new(ChatId::new(Uuid::from_u128(7)), FeedSessionId::new(3))
    }

    #[test]
    fn subscribe_frame_carries_protocol_shape() {
        let chat_id = ChatId::new(Uuid::from_u128(7));
        let frame: serde_json::Value =
            serde_json::from_str(&subscribe_frame(chat_id)).unwrap();

        assert_eq!(frame["type"], "subscribe");
        assert_eq!(frame["id"], FEED_OPERATION_ID);
        assert_eq!(frame["payload"]["variables"]["chatId"], chat_id.to_string());
        assert!(
            frame["payload"]["query"]
                .as_str()
                .unwrap()
                .contains("order_by: { created_at: asc }")
        );
    }

    #[test]
    fn connection_init_frame_carries_bearer_header() {
        let frame: serde_json::Value =
            serde_json::from_str(&connection_init_frame("jwt-token")).unwrap();

        assert_eq!(frame["type"], "connection_init");
        assert_eq!(
            frame["payload"]["headers"]["Authorization"],
            "Bearer jwt-token"
        );
    }

    #[test]
    fn server_frames_parse_across_lifecycle() {
        let ack: ServerFrame =
            serde_json::from_str(r#"{ "type": "connection_ack", "payload": {} }"#).unwrap();
        assert!(matches!(ack, ServerFrame::ConnectionAck {}));

        let ping: ServerFrame = serde_json::from_str(r#"{ "type": "ping" }"#).unwrap();
        assert!(matches!(ping, ServerFrame::Ping {}));

        let complete: ServerFrame =
            serde_json::from_str(r#"{ "type": "complete", "id": "1" }"#).unwrap();
        assert!(matches!(complete, ServerFrame::Complete { id } if id == "1"));

        let next: ServerFrame = serde_json::from_str(
            r#"{
                "type": "next",
                "id": "1",
                "payload": {
                    "data": {
                        "messages": [{
                            "id": "7f8a6e9c-4f2a-4f6e-b6ce-16e3f2f3fa11",
                            "user_id": null,
                            "content": "hi",
                            "created_at": "2026-08-23T10:15:00Z",
                            "is_bot": true
                        }]
                    }
                }
            }"#,
        )
        .unwrap();
        let ServerFrame::Next { id, payload } = next else {
            panic!("expected next frame");
        };
        assert_eq!(id, "1");
        let snapshot = payload.into_snapshot().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot[0].is_bot);
    }

    #[test]
    fn next_payload_with_errors_becomes_feed_error() {
        let payload: NextPayload = serde_json::from_str(
            r#"{ "data": null, "errors": [{ "message": "subscription denied" }] }"#,
        )
        .unwrap();

        let error = payload.into_snapshot().unwrap_err();
        assert_eq!(error, "subscription denied");
    }

    #[tokio::test]
    async fn dropping_the_stream_resolves_the_cancel_branch() {
        let (_event_tx, stream, mut cancel_rx) = make_feed_stream(target());
        assert!(cancel_rx.try_recv().is_err());

        drop(stream);
        // Sender dropped without sending resolves the receiver immediately.
        assert!(cancel_rx.await.is_err());
    }

    #[tokio::test]
    async fn events_for_a_target_arrive_in_order() {
        let target = target();
        let (event_tx, mut stream, _cancel_rx) = make_feed_stream(target);

        emit(&event_tx, target, FeedEventPayload::Snapshot(Vec::new()));
        emit(&event_tx, target, FeedEventPayload::Completed);

        let first = stream.recv().await.unwrap();
        assert_eq!(first.target, target);
        assert!(matches!(first.payload, FeedEventPayload::Snapshot(_)));
        let second = stream.recv().await.unwrap();
        assert!(matches!(second.payload, FeedEventPayload::Completed));
    }
}
