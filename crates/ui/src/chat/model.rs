//! Pure state helpers shared by the chat views.

use chrono::{DateTime, Utc};
use parlor_gateway::{ChatId, ChatRecord, FeedTarget, MessageRecord};
use uuid::Uuid;

/// How long after a message send the bot indicator keeps trusting an
/// incoming bot row as the reply, in seconds.
pub const BOT_REPLY_RECENCY_WINDOW_SECS: i64 = 300;

/// Upper bound on how long the composing indicator may stay armed
/// without a reply, in seconds.
pub const COMPOSING_HARD_TIMEOUT_SECS: u64 = 120;

/// Generic notice shown when the chat list fails to load.
pub const CHAT_LIST_ERROR_NOTICE: &str = "Error loading chats";

/// Load state of a remote collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemotePhase {
    Idle,
    Loading,
    Loaded,
    Failed(String),
}

/// A remote collection that keeps its last good items through reloads
/// and failures.
#[derive(Debug, Clone)]
pub struct RemoteList<T> {
    pub phase: RemotePhase,
    pub items: Vec<T>,
}

impl<T> Default for RemoteList<T> {
    fn default() -> Self {
        Self {
            phase: RemotePhase::Idle,
            items: Vec::new(),
        }
    }
}

impl<T> RemoteList<T> {
    pub fn begin_load(&mut self) {
        self.phase = RemotePhase::Loading;
    }

    pub fn finish(&mut self, items: Vec<T>) {
        self.items = items;
        self.phase = RemotePhase::Loaded;
    }

    /// Records the failure but keeps the stale items visible.
    pub fn fail(&mut self, message: String) {
        self.phase = RemotePhase::Failed(message);
    }

    pub fn is_loading(&self) -> bool {
        self.phase == RemotePhase::Loading
    }

    pub fn error(&self) -> Option<&str> {
        match &self.phase {
            RemotePhase::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// Case-insensitive title substring filter over the chat list.
///
/// The query is matched verbatim, whitespace included.
pub fn filter_chats(chats: &[ChatRecord], query: &str) -> Vec<ChatRecord> {
    let needle = query.to_lowercase();
    chats
        .iter()
        .filter(|chat| chat.title.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

/// Whether a feed event addressed to `event_target` belongs to the feed
/// the workspace currently owns.
///
/// Session ids are minted per feed activation, so an event from a
/// torn-down feed never matches even when its chat id does.
pub fn feed_event_is_current(
    active_feed: Option<FeedTarget>,
    event_target: FeedTarget,
) -> bool {
    active_feed == Some(event_target)
}

/// Which chat to select after `deleted` disappears from `chats`.
///
/// The list is kept newest first, so the first remaining chat is the
/// natural landing spot.
pub fn next_selection_after_delete(chats: &[ChatRecord], deleted: ChatId) -> Option<ChatId> {
    chats.iter().map(|chat| chat.id).find(|id| *id != deleted)
}

/// Tracks the "bot is typing" indicator for one chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComposingIndicator {
    pub chat_id: ChatId,
    pub armed_at: DateTime<Utc>,
}

impl ComposingIndicator {
    pub fn new(chat_id: ChatId, armed_at: DateTime<Utc>) -> Self {
        Self { chat_id, armed_at }
    }

    /// True when the newest bot message landed within the trailing
    /// recency window, meaning the reply this indicator was waiting for
    /// has arrived.
    pub fn should_clear(&self, messages: &[MessageRecord], now: DateTime<Utc>) -> bool {
        let Some(last_bot) = messages.iter().rev().find(|message| message.is_bot) else {
            return false;
        };
        let age = now.signed_duration_since(last_bot.created_at);
        age.num_seconds() >= 0 && age.num_seconds() < BOT_REPLY_RECENCY_WINDOW_SECS
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.armed_at).num_seconds()
            >= COMPOSING_HARD_TIMEOUT_SECS as i64
    }
}

/// Visual classification of a message row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BubbleKind {
    Own,
    Peer,
    Bot,
}

pub fn bubble_kind(message: &MessageRecord, own_user_id: Option<Uuid>) -> BubbleKind {
    if message.is_bot {
        BubbleKind::Bot
    } else if message.user_id.is_some() && message.user_id == own_user_id {
        BubbleKind::Own
    } else {
        BubbleKind::Peer
    }
}

/// Whether a draft may be submitted right now.
pub fn can_send(content: &str, has_selection: bool, sending: bool) -> bool {
    has_selection && !sending && !content.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use parlor_gateway::FeedSessionId;

    fn chat(id: ChatId, title: &str) -> ChatRecord {
        ChatRecord {
            id,
            title: title.to_string(),
            created_at: Utc::now(),
        }
    }

    fn message(is_bot: bool, created_at: DateTime<Utc>) -> MessageRecord {
        MessageRecord {
            id: parlor_gateway::MessageId::new(Uuid::new_v4()),
            user_id: (!is_bot).then(Uuid::new_v4),
            content: "hi".to_string(),
            created_at,
            is_bot,
        }
    }

    #[test]
    fn filter_matches_case_insensitively() {
        let chats = vec![
            chat(ChatId::new(Uuid::new_v4()), "Weekend Plans"),
            chat(ChatId::new(Uuid::new_v4()), "groceries"),
            chat(ChatId::new(Uuid::new_v4()), "Work"),
        ];

        let hits = filter_chats(&chats, "pLaN");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Weekend Plans");
    }

    #[test]
    fn empty_filter_returns_everything() {
        let chats = vec![chat(ChatId::new(Uuid::new_v4()), "a"), chat(ChatId::new(Uuid::new_v4()), "b")];
        assert_eq!(filter_chats(&chats, "").len(), 2);
    }

    #[test]
    fn whitespace_in_the_filter_is_matched_verbatim() {
        let chats = vec![
            chat(ChatId::new(Uuid::new_v4()), "Weekend Plans"),
            chat(ChatId::new(Uuid::new_v4()), "Planning"),
        ];

        let hits = filter_chats(&chats, " plan");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Weekend Plans");

        assert!(filter_chats(&chats, "   ").is_empty());
    }

    #[test]
    fn filter_does_not_mutate_the_source_list() {
        let chats = vec![chat(ChatId::new(Uuid::new_v4()), "alpha"), chat(ChatId::new(Uuid::new_v4()), "beta")];
        let _ = filter_chats(&chats, "alpha");
        assert_eq!(chats.len(), 2);
    }

    #[test]
    fn delete_reselects_the_first_surviving_chat() {
        let first = ChatId::new(Uuid::new_v4());
        let second = ChatId::new(Uuid::new_v4());
        let chats = vec![chat(first, "first"), chat(second, "second")];

        assert_eq!(next_selection_after_delete(&chats, first), Some(second));
        assert_eq!(next_selection_after_delete(&chats, second), Some(first));
    }

    #[test]
    fn deleting_the_last_chat_clears_selection() {
        let only = ChatId::new(Uuid::new_v4());
        let chats = vec![chat(only, "only")];
        assert_eq!(next_selection_after_delete(&chats, only), None);
    }

    #[test]
    fn stale_feed_session_events_are_discarded() {
        let chat_id = ChatId::new(Uuid::new_v4());
        let current = FeedTarget::new(chat_id, FeedSessionId::new(2));
        let stale = FeedTarget::new(chat_id, FeedSessionId::new(1));

        assert!(feed_event_is_current(Some(current), current));
        assert!(!feed_event_is_current(Some(current), stale));
        assert!(!feed_event_is_current(None, current));
    }

    #[test]
    fn events_for_another_chat_never_match_the_active_feed() {
        let current = FeedTarget::new(ChatId::new(Uuid::new_v4()), FeedSessionId::new(1));
        let other = FeedTarget::new(ChatId::new(Uuid::new_v4()), FeedSessionId::new(1));

        assert!(!feed_event_is_current(Some(current), other));
    }

    #[test]
    fn recent_bot_message_clears_the_indicator() {
        let now = Utc::now();
        let indicator = ComposingIndicator::new(ChatId::new(Uuid::new_v4()), now - Duration::seconds(10));
        let messages = vec![
            message(false, now - Duration::seconds(30)),
            message(true, now - Duration::seconds(20)),
        ];

        assert!(indicator.should_clear(&messages, now));
    }

    #[test]
    fn stale_bot_message_keeps_the_indicator() {
        let now = Utc::now();
        let indicator = ComposingIndicator::new(ChatId::new(Uuid::new_v4()), now - Duration::seconds(10));
        let messages = vec![
            message(true, now - Duration::seconds(BOT_REPLY_RECENCY_WINDOW_SECS + 5)),
            message(false, now - Duration::seconds(2)),
        ];

        assert!(!indicator.should_clear(&messages, now));
    }

    #[test]
    fn indicator_without_any_bot_message_stays_armed() {
        let now = Utc::now();
        let indicator = ComposingIndicator::new(ChatId::new(Uuid::new_v4()), now);
        let messages = vec![message(false, now)];

        assert!(!indicator.should_clear(&messages, now));
    }

    #[test]
    fn indicator_expires_after_the_hard_timeout() {
        let now = Utc::now();
        let indicator = ComposingIndicator::new(
            ChatId::new(Uuid::new_v4()),
            now - Duration::seconds(COMPOSING_HARD_TIMEOUT_SECS as i64 + 1),
        );

        assert!(indicator.is_expired(now));
        assert!(!ComposingIndicator::new(ChatId::new(Uuid::new_v4()), now).is_expired(now));
    }

    #[test]
    fn bubble_kind_prefers_the_bot_flag() {
        let own = Uuid::new_v4();
        let mut row = message(true, Utc::now());
        row.user_id = Some(own);

        assert_eq!(bubble_kind(&row, Some(own)), BubbleKind::Bot);
    }

    #[test]
    fn bubble_kind_separates_own_and_peer_rows() {
        let own = Uuid::new_v4();
        let mut mine = message(false, Utc::now());
        mine.user_id = Some(own);
        let mut theirs = message(false, Utc::now());
        theirs.user_id = Some(Uuid::new_v4());

        assert_eq!(bubble_kind(&mine, Some(own)), BubbleKind::Own);
        assert_eq!(bubble_kind(&theirs, Some(own)), BubbleKind::Peer);
    }

    #[test]
    fn blank_or_busy_drafts_cannot_be_sent() {
        assert!(!can_send("  \n ", true, false));
        assert!(!can_send("hello", false, false));
        assert!(!can_send("hello", true, true));
        assert!(can_send("hello", true, false));
    }

    #[test]
    fn failed_reload_keeps_stale_items() {
        let mut list = RemoteList::default();
        list.finish(vec![chat(ChatId::new(Uuid::new_v4()), "kept")]);
        list.begin_load();
        list.fail(CHAT_LIST_ERROR_NOTICE.to_string());

        assert_eq!(list.items.len(), 1);
        assert_eq!(list.error(), Some(CHAT_LIST_ERROR_NOTICE));
    }
}
