use std::collections::BTreeSet;

use tokio::sync::watch;

use crate::common::{GUEST_IDENTITY, Identity};
use crate::error::ChatError;

/// Authenticated session as handed over by the sign-in layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub email: Option<String>,
}

impl Session {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
        }
    }
}

/// Maps sessions to identities against the configured administrators.
#[derive(Debug, Clone, Default)]
pub struct IdentityResolver {
    admin_ids: BTreeSet<String>,
}

impl IdentityResolver {
    pub fn new<I, S>(admin_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            admin_ids: admin_ids
                .into_iter()
                .map(Into::into)
                .filter(|id: &String| !id.trim().is_empty() && id != GUEST_IDENTITY)
                .collect(),
        }
    }

    pub fn is_admin_id(&self, id: &str) -> bool {
        self.admin_ids.contains(id)
    }

    pub fn admin_ids(&self) -> impl Iterator<Item = &str> {
        self.admin_ids.iter().map(String::as_str)
    }

    /// Visitors without a session (or with a blank user id) are the Guest.
    pub fn resolve(&self, session: Option<&Session>) -> Identity {
        match session {
            Some(session) if !session.user_id.trim().is_empty() => Identity {
                id: session.user_id.clone(),
                is_admin: self.is_admin_id(&session.user_id),
            },
            _ => Identity::guest(),
        }
    }

    pub fn require_admin(&self, session: Option<&Session>) -> Result<Identity, ChatError> {
        let identity = self.resolve(session);
        if identity.is_guest() {
            return Err(ChatError::NoSession);
        }
        if !identity.is_admin {
            return Err(ChatError::NotAdmin(identity.id));
        }
        Ok(identity)
    }
}

/// Current session plus a feed of sign-in/sign-out transitions.
pub struct SessionProvider {
    sender: watch::Sender<Option<Session>>,
}

impl SessionProvider {
    pub fn new(initial: Option<Session>) -> Self {
        let (sender, _) = watch::channel(initial);
        Self { sender }
    }

    pub fn current(&self) -> Option<Session> {
        self.sender.borrow().clone()
    }

    pub fn sign_in(&self, session: Session) {
        log::info!("Signed in as {}", session.user_id);
        self.sender.send_replace(Some(session));
    }

    pub fn sign_out(&self) {
        if self.sender.send_replace(None).is_some() {
            log::info!("Signed out");
        }
    }

    pub fn changes(&self) -> watch::Receiver<Option<Session>> {
        self.sender.subscribe()
    }
}

impl Default for SessionProvider {
    fn default() -> Self {
        Self::new(None)
    }
}
