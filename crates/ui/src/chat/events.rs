use parlor_gateway::ChatId;

/// A chat row in the sidebar was activated.
#[derive(Debug, Clone)]
pub struct ChatSelected {
    pub chat_id: ChatId,
}

/// The user submitted a new chat title.
#[derive(Debug, Clone)]
pub struct CreateChatRequested {
    pub title: String,
}

/// The user confirmed the inline delete prompt for a chat.
#[derive(Debug, Clone)]
pub struct DeleteChatConfirmed {
    pub chat_id: ChatId,
}

/// The sign-out button in the sidebar footer was clicked.
#[derive(Debug, Clone)]
pub struct SignOutClicked;

/// The change-password button in the sidebar footer was clicked.
#[derive(Debug, Clone)]
pub struct ChangePasswordClicked;

/// The composer submitted a message draft.
#[derive(Debug, Clone)]
pub struct SubmitMessage {
    pub content: String,
}
