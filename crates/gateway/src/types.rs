use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ids::{ChatId, MessageId};

/// One chat session as stored by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRecord {
    pub id: ChatId,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// One message row delivered by queries and feed snapshots.
///
/// `user_id` is absent for bot-authored rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: MessageId,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_bot: bool,
}

/// Orders a feed snapshot for display.
///
/// The gateway already orders by `created_at`, but equal timestamps have no
/// defined order on the wire; the id tiebreak makes re-renders stable.
pub fn normalize_messages(mut messages: Vec<MessageRecord>) -> Vec<MessageRecord> {
    messages.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn message(id: u128, seconds: i64) -> MessageRecord {
        MessageRecord {
            id: MessageId::new(Uuid::from_u128(id)),
            user_id: None,
            content: format!("m-{id}"),
            created_at: Utc.timestamp_opt(seconds, 0).unwrap(),
            is_bot: false,
        }
    }

    #[test]
    fn snapshot_order_is_non_decreasing_by_created_at() {
        let normalized = normalize_messages(vec![
            message(3, 30),
            message(1, 10),
            message(2, 20),
        ]);

        let seconds = normalized
            .iter()
            .map(|m| m.created_at.timestamp())
            .collect::<Vec<_>>();
        assert_eq!(seconds, vec![10, 20, 30]);
    }

    #[test]
    fn equal_timestamps_break_ties_by_id() {
        let normalized = normalize_messages(vec![message(9, 10), message(2, 10), message(5, 10)]);

        let ids = normalized.iter().map(|m| m.id).collect::<Vec<_>>();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn bot_rows_decode_without_user_id() {
        let raw = r#"{
            "id": "7f8a6e9c-4f2a-4f6e-b6ce-16e3f2f3fa11",
            "user_id": null,
            "content": "hello from the bot",
            "created_at": "2026-08-23T10:15:00Z",
            "is_bot": true
        }"#;

        let record: MessageRecord = serde_json::from_str(raw).unwrap();
        assert!(record.is_bot);
        assert!(record.user_id.is_none());
    }
}
