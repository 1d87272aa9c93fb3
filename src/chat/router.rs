use crate::common::{ChatMessage, Identity};
use crate::error::{ChatError, StoreError};
use crate::storage::{MessageStore, Subscription, recv_or_pending};

use super::session::IdentityResolver;
use super::stream::{Conversation, subscribe_conversation};

/// Owns the message stream of the conversation currently on screen.
///
/// Visitors write to the primary administrator and see replies from any
/// administrator. Administrators pick one counterpart at a time; the previous
/// stream is cancelled before the next one starts.
pub struct ConversationRouter {
    store: MessageStore,
    identity: Identity,
    resolver: IdentityResolver,
    primary_admin: Option<String>,
    selected: Option<String>,
    stream: Option<Subscription<Vec<ChatMessage>>>,
}

impl ConversationRouter {
    pub fn new(
        store: MessageStore,
        identity: Identity,
        resolver: IdentityResolver,
        primary_admin: Option<String>,
    ) -> Self {
        let mut router = Self {
            store,
            identity,
            resolver,
            primary_admin,
            selected: None,
            stream: None,
        };

        if !router.identity.is_admin {
            match router.primary_admin.clone() {
                Some(admin) => router.route_to(admin),
                None => log::warn!("No administrator configured; chat is unavailable"),
            }
        }
        router
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Who outgoing messages are addressed to.
    pub fn counterpart(&self) -> Option<&str> {
        if self.identity.is_admin {
            self.selected.as_deref()
        } else {
            self.primary_admin.as_deref()
        }
    }

    pub fn select(&mut self, counterpart: &str) -> Result<(), ChatError> {
        if !self.identity.is_admin {
            return Err(ChatError::NotAdmin(self.identity.id.clone()));
        }
        if self.selected.as_deref() == Some(counterpart) {
            return Ok(());
        }

        self.route_to(counterpart.to_string());
        self.selected = Some(counterpart.to_string());
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        if self.identity.is_admin {
            if let Some(stream) = self.stream.take() {
                stream.unsubscribe();
            }
            self.selected = None;
        }
    }

    /// Next snapshot of the active conversation; pends while none is routed.
    pub async fn next_snapshot(&mut self) -> Option<Result<Vec<ChatMessage>, StoreError>> {
        recv_or_pending(self.stream.as_mut()).await
    }

    fn route_to(&mut self, counterpart: String) {
        if let Some(previous) = self.stream.take() {
            previous.unsubscribe();
        }
        let conversation = Conversation::between(&self.identity, &counterpart, &self.resolver);
        self.stream = Some(subscribe_conversation(&self.store, conversation));
    }
}
