use serde::{Deserialize, Serialize};

/// Identity used for visitors without a session.
pub const GUEST_IDENTITY: &str = "Guest";

/// Domain model đại diện một tin nhắn chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub text: String,
    pub sender: String,
    /// Absent on records written before recipients were tracked.
    #[serde(default)]
    pub recipient: Option<String>,
    /// Store-assigned, milliseconds since the Unix epoch.
    pub created_at: i64,
    #[serde(default)]
    pub read: Option<bool>,
}

impl ChatMessage {
    pub fn is_read(&self) -> bool {
        self.read.unwrap_or(false)
    }
}

/// Payload accepted by the store; id and timestamp are assigned on append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub text: String,
    pub sender: String,
    pub recipient: Option<String>,
}

/// Resolved principal of the current session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub is_admin: bool,
}

impl Identity {
    pub fn guest() -> Self {
        Self {
            id: GUEST_IDENTITY.to_string(),
            is_admin: false,
        }
    }

    pub fn is_guest(&self) -> bool {
        self.id == GUEST_IDENTITY
    }
}

/// Entry of the user directory (identity -> display label).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub id: String,
    pub email: Option<String>,
}

/// Non-admin side of a conversation as listed for the administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counterpart {
    pub identity: String,
    pub label: String,
}
