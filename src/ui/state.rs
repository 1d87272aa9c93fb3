use crate::common::{ChatEvent, ChatMessage, Counterpart, Identity};
use chrono::{DateTime, Utc};

/// Sự kiện hiển thị trong thanh trạng thái
#[derive(Debug, Clone)]
pub struct StatusLine {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub is_error: bool,
}

/// Trạng thái cục bộ của UI.
pub struct AppState {
    pub identity: Identity,
    pub messages: Vec<ChatMessage>,
    /// Counterpart the message list belongs to.
    pub conversation: Option<String>,
    pub counterparts: Vec<Counterpart>,
    pub selected: Option<String>,
    pub unread: usize,
    pub input_text: String,
    /// Text handed to the worker and not yet confirmed.
    pub pending_send: Option<String>,
    pub status: Option<StatusLine>,
    /// Set whenever a new snapshot arrives; the chat area scrolls to the end.
    pub scroll_to_latest: bool,
}

impl AppState {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            messages: Vec::new(),
            conversation: None,
            counterparts: Vec::new(),
            selected: None,
            unread: 0,
            input_text: String::new(),
            pending_send: None,
            status: None,
            scroll_to_latest: false,
        }
    }

    pub fn apply_event(&mut self, event: ChatEvent) {
        match event {
            ChatEvent::IdentityChanged(identity) => {
                self.set_status(format!("Signed in as {}", identity.id), false);
                self.identity = identity;
                self.messages.clear();
                self.conversation = None;
                self.counterparts.clear();
                self.selected = None;
                self.pending_send = None;
            }
            ChatEvent::MessagesUpdated {
                counterpart,
                messages,
            } => {
                // A snapshot queued before the selection changed is stale.
                if self.identity.is_admin && counterpart != self.selected {
                    log::debug!("Dropping snapshot for {counterpart:?}");
                    return;
                }
                self.conversation = counterpart;
                self.messages = messages;
                self.scroll_to_latest = true;
            }
            ChatEvent::CounterpartsUpdated(list) => self.counterparts = list,
            ChatEvent::UnreadUpdated(count) => self.unread = count,
            ChatEvent::MessageSent(message) => {
                // Only clear what was sent; the user may have kept typing.
                if let Some(pending) = self.pending_send.take() {
                    if self.input_text == pending {
                        self.input_text.clear();
                    }
                }
                self.set_status(format!("Sent at {}", format_time(message.created_at)), false);
            }
            ChatEvent::SendFailed { text, reason } => {
                self.pending_send = None;
                if self.input_text.trim().is_empty() {
                    self.input_text = text;
                }
                self.set_status(format!("Message not sent: {reason}"), true);
            }
            ChatEvent::Failure(reason) => self.set_status(reason, true),
        }
    }

    /// Text to hand to the worker, or `None` if blank or a send is in flight.
    pub fn take_outgoing(&mut self) -> Option<String> {
        if self.pending_send.is_some() || self.input_text.trim().is_empty() {
            return None;
        }
        self.pending_send = Some(self.input_text.clone());
        Some(self.input_text.clone())
    }

    /// Returns the counterpart to route to when the selection changes.
    pub fn select(&mut self, identity: &str) -> Option<String> {
        if self.selected.as_deref() == Some(identity) {
            return None;
        }
        self.selected = Some(identity.to_string());
        self.messages.clear();
        Some(identity.to_string())
    }

    /// The selected conversation has not delivered its first snapshot yet.
    pub fn is_loading(&self) -> bool {
        self.identity.is_admin && self.selected.is_some() && self.conversation != self.selected
    }

    pub fn is_own(&self, message: &ChatMessage) -> bool {
        message.sender == self.identity.id
    }

    pub fn set_status(&mut self, message: String, is_error: bool) {
        self.status = Some(StatusLine {
            timestamp: Utc::now(),
            message,
            is_error,
        });
    }
}

pub fn format_time(created_at: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(created_at)
        .map(|time| time.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string())
}
