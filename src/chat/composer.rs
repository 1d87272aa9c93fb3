use crate::common::{ChatMessage, Identity, NewMessage};
use crate::error::ChatError;
use crate::storage::MessageStore;

/// Append `text` from `author` to `recipient`.
///
/// Blank text is a no-op and returns `Ok(None)`; the stored text is trimmed.
pub async fn send_message(
    store: &MessageStore,
    author: &Identity,
    recipient: Option<&str>,
    text: &str,
) -> Result<Option<ChatMessage>, ChatError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    let recipient = recipient.ok_or(ChatError::NoCounterpart)?;

    let stored = store
        .append_message(NewMessage {
            text: text.to_string(),
            sender: author.id.clone(),
            recipient: Some(recipient.to_string()),
        })
        .await?;

    log::info!("{} -> {}: message {}", author.id, recipient, stored.id);
    Ok(Some(stored))
}

/// Input buffer bound to an author and the current recipient.
pub struct Composer {
    store: MessageStore,
    author: Identity,
    recipient: Option<String>,
    draft: String,
}

impl Composer {
    pub fn new(store: MessageStore, author: Identity, recipient: Option<String>) -> Self {
        Self {
            store,
            author,
            recipient,
            draft: String::new(),
        }
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut String {
        &mut self.draft
    }

    pub fn recipient(&self) -> Option<&str> {
        self.recipient.as_deref()
    }

    pub fn set_recipient(&mut self, recipient: Option<String>) {
        self.recipient = recipient;
    }

    /// Send the draft. It is cleared only once the message is stored.
    pub async fn submit(&mut self) -> Result<Option<ChatMessage>, ChatError> {
        match send_message(
            &self.store,
            &self.author,
            self.recipient.as_deref(),
            &self.draft,
        )
        .await
        {
            Ok(Some(message)) => {
                self.draft.clear();
                Ok(Some(message))
            }
            Ok(None) => Ok(None),
            Err(err) => {
                log::error!("Error adding message from {}: {err}", self.author.id);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn visitor_composer(store: &MessageStore) -> Composer {
        Composer::new(store.clone(), Identity::guest(), Some("admin".to_string()))
    }

    #[tokio::test]
    async fn stores_trimmed_text_with_sender_and_clears_draft() {
        let store = MessageStore::in_memory().unwrap();
        let mut composer = visitor_composer(&store);
        composer.draft_mut().push_str("  hello  ");
        let submitted_at = Utc::now().timestamp_millis();

        let message = composer.submit().await.unwrap().unwrap();
        assert_eq!(message.text, "hello");
        assert_eq!(message.sender, "Guest");
        assert_eq!(message.recipient.as_deref(), Some("admin"));
        assert!(message.created_at >= submitted_at);
        assert_eq!(composer.draft(), "");
        assert_eq!(store.message_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn blank_drafts_are_ignored() {
        let store = MessageStore::in_memory().unwrap();
        let mut composer = visitor_composer(&store);

        for draft in ["", "   ", "\n\t "] {
            composer.draft_mut().clear();
            composer.draft_mut().push_str(draft);
            assert_eq!(composer.submit().await.unwrap(), None);
        }
        assert_eq!(store.message_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn draft_survives_a_failed_send() {
        let store = MessageStore::in_memory().unwrap();
        let admin = Identity {
            id: "admin".to_string(),
            is_admin: true,
        };
        let mut composer = Composer::new(store.clone(), admin, None);
        composer.draft_mut().push_str("reply");

        let err = composer.submit().await.unwrap_err();
        assert!(matches!(err, ChatError::NoCounterpart));
        assert_eq!(composer.draft(), "reply");

        composer.set_recipient(Some("x".to_string()));
        assert!(composer.submit().await.unwrap().is_some());
        assert_eq!(composer.draft(), "");
    }

    #[tokio::test]
    async fn store_failures_keep_the_draft() {
        let store = MessageStore::in_memory().unwrap();
        store.execute_raw("DROP TABLE messages").await.unwrap();
        let mut composer = visitor_composer(&store);
        composer.draft_mut().push_str("hello");

        let err = composer.submit().await.unwrap_err();
        assert!(matches!(err, ChatError::Store(_)));
        assert_eq!(composer.draft(), "hello");
    }
}
