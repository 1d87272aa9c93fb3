use crate::common::Identity;
use crate::error::ChatError;
use crate::storage::{Collection, MessageStore, Subscription, watch};

/// Live count of messages whose read flag is absent or false, across the
/// whole store. Recomputed on every message change.
pub fn subscribe_unread(store: &MessageStore) -> Subscription<usize> {
    watch(store, &[Collection::Messages], |store| async move {
        store.unread_count().await
    })
}

/// Flag one message as seen by the administrator.
pub async fn mark_read(
    store: &MessageStore,
    identity: &Identity,
    message_id: &str,
) -> Result<(), ChatError> {
    ensure_admin(identity)?;
    store.set_read(message_id, true).await?;
    log::debug!("{} marked {message_id} as read", identity.id);
    Ok(())
}

/// Flag every unread message; returns how many were updated.
pub async fn mark_all_read(store: &MessageStore, identity: &Identity) -> Result<usize, ChatError> {
    ensure_admin(identity)?;
    let updated = store.mark_all_read().await?;
    log::info!("{} marked {updated} messages as read", identity.id);
    Ok(updated)
}

fn ensure_admin(identity: &Identity) -> Result<(), ChatError> {
    if identity.is_admin {
        Ok(())
    } else {
        Err(ChatError::NotAdmin(identity.id.clone()))
    }
}
