use super::types::{ChatMessage, Counterpart, Identity};

/// Sự kiện từ chat worker gửi lên UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// Sign-in or sign-out switched the role; views belong to the new identity.
    IdentityChanged(Identity),
    /// Full snapshot of the active conversation.
    MessagesUpdated {
        counterpart: Option<String>,
        messages: Vec<ChatMessage>,
    },
    CounterpartsUpdated(Vec<Counterpart>),
    UnreadUpdated(usize),
    MessageSent(ChatMessage),
    /// The draft is handed back so the front end can keep it for a retry.
    SendFailed {
        text: String,
        reason: String,
    },
    Failure(String),
}
