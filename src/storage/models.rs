use crate::common::{ChatMessage, DirectoryEntry};
use crate::error::StoreError;

/// Message row as read from the `messages` table, before validation.
#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: String,
    pub text: String,
    pub sender: String,
    pub recipient: Option<String>,
    pub created_at: i64,
    pub read: Option<bool>,
}

impl TryFrom<MessageRow> for ChatMessage {
    type Error = StoreError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        if row.id.trim().is_empty() {
            return Err(StoreError::Malformed("message without id".to_string()));
        }
        if row.sender.trim().is_empty() {
            return Err(StoreError::Malformed(format!(
                "message {} has no sender",
                row.id
            )));
        }
        if row.created_at < 0 {
            return Err(StoreError::Malformed(format!(
                "message {} has negative timestamp {}",
                row.id, row.created_at
            )));
        }

        Ok(ChatMessage {
            id: row.id,
            text: row.text,
            sender: row.sender,
            recipient: row.recipient.filter(|r| !r.trim().is_empty()),
            created_at: row.created_at,
            read: row.read,
        })
    }
}

/// Row of the `users` directory table.
#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub email: Option<String>,
}

impl From<UserRow> for DirectoryEntry {
    fn from(row: UserRow) -> Self {
        DirectoryEntry {
            id: row.id,
            email: row.email,
        }
    }
}

/// Keeps the valid rows, logging the ones that fail validation.
pub fn parse_messages(rows: Vec<MessageRow>) -> Vec<ChatMessage> {
    rows.into_iter()
        .filter_map(|row| match ChatMessage::try_from(row) {
            Ok(message) => Some(message),
            Err(err) => {
                log::warn!("Skipping stored message: {err}");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, sender: &str) -> MessageRow {
        MessageRow {
            id: id.to_string(),
            text: "hello".to_string(),
            sender: sender.to_string(),
            recipient: Some(String::new()),
            created_at: 10,
            read: None,
        }
    }

    #[test]
    fn blank_recipient_is_treated_as_absent() {
        let message = ChatMessage::try_from(row("m1", "Guest")).unwrap();
        assert_eq!(message.recipient, None);
        assert!(!message.is_read());
    }

    #[test]
    fn rows_without_sender_are_skipped() {
        let parsed = parse_messages(vec![row("m1", "Guest"), row("m2", "  "), row("", "x")]);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].id, "m1");
    }
}
