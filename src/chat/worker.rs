use tokio::sync::{mpsc, watch};

use crate::common::{ChatCommand, ChatEvent, Counterpart, Identity};
use crate::storage::{MessageStore, Subscription, recv_or_pending};

use super::composer::send_message;
use super::conversations::subscribe_counterparts;
use super::router::ConversationRouter;
use super::session::{IdentityResolver, Session};
use super::unread::{mark_all_read, mark_read, subscribe_unread};

/// Background task owning every live query of one chat session.
///
/// Front ends talk to it through `ChatCommand`s and receive `ChatEvent`s.
/// The identity follows the session feed: signing in or out rebuilds the
/// conversation routing and the admin-only subscriptions.
pub struct ChatWorker {
    store: MessageStore,
    resolver: IdentityResolver,
    primary_admin: Option<String>,
    sessions: watch::Receiver<Option<Session>>,
    router: ConversationRouter,
    event_sender: mpsc::Sender<ChatEvent>,
    command_receiver: mpsc::Receiver<ChatCommand>,
}

impl ChatWorker {
    pub fn new(
        store: MessageStore,
        resolver: IdentityResolver,
        primary_admin: Option<String>,
        mut sessions: watch::Receiver<Option<Session>>,
        event_sender: mpsc::Sender<ChatEvent>,
        command_receiver: mpsc::Receiver<ChatCommand>,
    ) -> Self {
        let session = sessions.borrow_and_update().clone();
        let identity = resolver.resolve(session.as_ref());
        let router = ConversationRouter::new(
            store.clone(),
            identity,
            resolver.clone(),
            primary_admin.clone(),
        );
        Self {
            store,
            resolver,
            primary_admin,
            sessions,
            router,
            event_sender,
            command_receiver,
        }
    }

    pub async fn run(mut self) {
        let identity = self.router.identity().clone();
        log::info!(
            "Chat worker started for {} (admin: {})",
            identity.id,
            identity.is_admin
        );

        let mut unread = subscribe_unread(&self.store);
        let mut counterparts = self.watch_counterparts();
        let mut sessions_open = true;

        loop {
            tokio::select! {
                command = self.command_receiver.recv() => {
                    match command {
                        Some(command) => self.handle_command(command).await,
                        None => break,
                    }
                }
                changed = self.sessions.changed(), if sessions_open => {
                    if changed.is_err() {
                        log::debug!("Session feed closed; keeping the current identity");
                        sessions_open = false;
                    } else {
                        let session = self.sessions.borrow_and_update().clone();
                        let identity = self.resolver.resolve(session.as_ref());
                        if &identity != self.router.identity() {
                            self.switch_identity(identity.clone());
                            counterparts = self.watch_counterparts();
                            self.emit(ChatEvent::IdentityChanged(identity)).await;
                        }
                    }
                }
                Some(update) = self.router.next_snapshot() => {
                    let event = match update {
                        Ok(messages) => ChatEvent::MessagesUpdated {
                            counterpart: self.router.counterpart().map(str::to_string),
                            messages,
                        },
                        Err(err) => ChatEvent::Failure(format!("Conversation unavailable: {err}")),
                    };
                    self.emit(event).await;
                }
                Some(update) = unread.recv() => {
                    let event = match update {
                        Ok(count) => ChatEvent::UnreadUpdated(count),
                        Err(err) => ChatEvent::Failure(format!("Unread count unavailable: {err}")),
                    };
                    self.emit(event).await;
                }
                Some(update) = recv_or_pending(counterparts.as_mut()) => {
                    let event = match update {
                        Ok(list) => ChatEvent::CounterpartsUpdated(list),
                        Err(err) => ChatEvent::Failure(format!("Conversation list unavailable: {err}")),
                    };
                    self.emit(event).await;
                }
            }
        }

        log::info!("Chat worker for {} stopped", self.router.identity().id);
    }

    /// Admin-only conversation list; `None` for visitors.
    fn watch_counterparts(&self) -> Option<Subscription<Vec<Counterpart>>> {
        let identity = self.router.identity();
        if !identity.is_admin {
            return None;
        }
        match subscribe_counterparts(&self.store, identity, &self.resolver) {
            Ok(subscription) => Some(subscription),
            Err(err) => {
                log::warn!("Conversation list unavailable for {}: {err}", identity.id);
                None
            }
        }
    }

    fn switch_identity(&mut self, identity: Identity) {
        log::info!(
            "Switching chat to {} (admin: {})",
            identity.id,
            identity.is_admin
        );
        // Dropping the previous router cancels its stream.
        self.router = ConversationRouter::new(
            self.store.clone(),
            identity,
            self.resolver.clone(),
            self.primary_admin.clone(),
        );
    }

    async fn handle_command(&mut self, command: ChatCommand) {
        match command {
            ChatCommand::SendMessage(text) => {
                let identity = self.router.identity().clone();
                let recipient = self.router.counterpart().map(str::to_string);
                match send_message(&self.store, &identity, recipient.as_deref(), &text).await {
                    Ok(Some(message)) => self.emit(ChatEvent::MessageSent(message)).await,
                    Ok(None) => {}
                    Err(err) => {
                        log::error!("Error adding message: {err}");
                        self.emit(ChatEvent::SendFailed {
                            text,
                            reason: err.to_string(),
                        })
                        .await;
                    }
                }
            }
            ChatCommand::SelectConversation(counterpart) => {
                if let Err(err) = self.router.select(&counterpart) {
                    log::warn!("Cannot select conversation {counterpart}: {err}");
                    self.emit(ChatEvent::Failure(err.to_string())).await;
                }
            }
            ChatCommand::ClearSelection => {
                self.router.clear_selection();
                self.emit(ChatEvent::MessagesUpdated {
                    counterpart: None,
                    messages: Vec::new(),
                })
                .await;
            }
            ChatCommand::MarkRead { message_id } => {
                let identity = self.router.identity().clone();
                if let Err(err) = mark_read(&self.store, &identity, &message_id).await {
                    log::warn!("Failed to mark {message_id} as read: {err}");
                    self.emit(ChatEvent::Failure(err.to_string())).await;
                }
            }
            ChatCommand::MarkAllRead => {
                let identity = self.router.identity().clone();
                if let Err(err) = mark_all_read(&self.store, &identity).await {
                    log::warn!("Failed to mark messages as read: {err}");
                    self.emit(ChatEvent::Failure(err.to_string())).await;
                }
            }
        }
    }

    async fn emit(&self, event: ChatEvent) {
        if let Err(err) = self.event_sender.send(event).await {
            log::warn!("Failed to notify front end: {err}");
        }
    }
}
