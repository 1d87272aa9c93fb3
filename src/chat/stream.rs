use crate::common::{ChatMessage, Identity};
use crate::storage::{Collection, MessageStore, Subscription, watch};

use super::session::IdentityResolver;

/// One visitor's thread with the administrators as a group.
///
/// Any administrator may answer; every one of them sees the same thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    visitor: String,
    admins: Vec<String>,
}

impl Conversation {
    pub fn new(visitor: impl Into<String>, resolver: &IdentityResolver) -> Self {
        Self {
            visitor: visitor.into(),
            admins: resolver.admin_ids().map(str::to_string).collect(),
        }
    }

    /// The thread `identity` shares with `counterpart`.
    pub fn between(identity: &Identity, counterpart: &str, resolver: &IdentityResolver) -> Self {
        if identity.is_admin {
            Self::new(counterpart, resolver)
        } else {
            Self::new(identity.id.as_str(), resolver)
        }
    }
}

/// Live, oldest-first view of the messages of `conversation`.
pub fn subscribe_conversation(
    store: &MessageStore,
    conversation: Conversation,
) -> Subscription<Vec<ChatMessage>> {
    log::debug!(
        "Subscribing to conversation of {} with {} administrator(s)",
        conversation.visitor,
        conversation.admins.len()
    );

    watch(store, &[Collection::Messages], move |store| {
        let conversation = conversation.clone();
        async move {
            store
                .conversation_messages(&conversation.visitor, &conversation.admins)
                .await
        }
    })
}
