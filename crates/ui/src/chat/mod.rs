/// Webhook client that asks the bot for a reply.
pub mod bot;
/// Event contracts for chat module wiring.
pub mod events;
pub mod message_input;
pub mod message_list;
/// Pure state helpers shared across the chat views.
pub mod model;
pub mod scroll_manager;
pub mod sidebar;
pub mod workspace;

pub use bot::{BotError, BotTrigger};
pub use events::{
    ChangePasswordClicked, ChatSelected, CreateChatRequested, DeleteChatConfirmed, SignOutClicked,
    SubmitMessage,
};
pub use message_input::MessageInput;
pub use message_list::{FeedPhase, MessageList};
pub use model::{BubbleKind, ComposingIndicator, RemoteList, RemotePhase};
pub use scroll_manager::ScrollManager;
pub use sidebar::ChatSidebar;
pub use workspace::ChatWorkspace;
