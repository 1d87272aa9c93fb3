//! Admin-side discovery of the visitors who wrote in.

use std::collections::BTreeSet;

use crate::common::{Counterpart, GUEST_IDENTITY, Identity};
use crate::error::{ChatError, StoreError};
use crate::storage::{Collection, MessageStore, Subscription, watch};

use super::session::IdentityResolver;

/// Live list of counterparts, one entry per non-admin sender.
///
/// The list is re-evaluated on every message or directory change.
pub fn subscribe_counterparts(
    store: &MessageStore,
    admin: &Identity,
    resolver: &IdentityResolver,
) -> Result<Subscription<Vec<Counterpart>>, ChatError> {
    if !admin.is_admin {
        return Err(ChatError::NotAdmin(admin.id.clone()));
    }

    let admin_ids: BTreeSet<String> = resolver.admin_ids().map(str::to_string).collect();
    log::debug!("Watching conversations for {}", admin.id);

    Ok(watch(
        store,
        &[Collection::Messages, Collection::Users],
        move |store| {
            let admin_ids = admin_ids.clone();
            async move { resolve_counterparts(&store, &admin_ids).await }
        },
    ))
}

/// One-shot evaluation of the counterpart list.
pub async fn resolve_counterparts(
    store: &MessageStore,
    admin_ids: &BTreeSet<String>,
) -> Result<Vec<Counterpart>, StoreError> {
    let senders = store.distinct_senders().await?;
    let mut counterparts = Vec::with_capacity(senders.len());

    for sender in senders {
        if admin_ids.contains(&sender) {
            continue;
        }
        if let Some(label) = resolve_label(store, &sender).await {
            counterparts.push(Counterpart {
                identity: sender,
                label,
            });
        }
    }

    Ok(counterparts)
}

/// A counterpart whose label cannot be resolved is left out of the list.
async fn resolve_label(store: &MessageStore, identity: &str) -> Option<String> {
    if identity == GUEST_IDENTITY {
        return Some(GUEST_IDENTITY.to_string());
    }

    match store.get_user(identity).await {
        Ok(Some(entry)) => match entry.email {
            Some(email) if !email.trim().is_empty() => Some(email),
            _ => {
                log::warn!("Directory entry for {identity} has no label; skipping");
                None
            }
        },
        Ok(None) => {
            log::warn!("No directory entry for {identity}; skipping");
            None
        }
        Err(err) => {
            log::warn!("Directory lookup for {identity} failed: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::common::{ChatMessage, DirectoryEntry};

    fn admin() -> (Identity, IdentityResolver) {
        let resolver = IdentityResolver::new(["admin"]);
        let identity = Identity {
            id: "admin".to_string(),
            is_admin: true,
        };
        (identity, resolver)
    }

    async fn seed(store: &MessageStore, id: &str, sender: &str, created_at: i64) {
        store
            .insert_message(&ChatMessage {
                id: id.to_string(),
                text: "hi".to_string(),
                sender: sender.to_string(),
                recipient: None,
                created_at,
                read: None,
            })
            .await
            .unwrap();
    }

    async fn register(store: &MessageStore, id: &str, email: Option<&str>) {
        store
            .upsert_user(&DirectoryEntry {
                id: id.to_string(),
                email: email.map(str::to_string),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn distinct_non_admin_senders_regardless_of_order() {
        let store = MessageStore::in_memory().unwrap();
        register(&store, "x", Some("x@example.com")).await;
        register(&store, "y", Some("y@example.com")).await;
        seed(&store, "1", "y", 5).await;
        seed(&store, "2", "admin", 1).await;
        seed(&store, "3", "x", 3).await;
        seed(&store, "4", "y", 2).await;
        seed(&store, "5", "x", 9).await;

        let (_, resolver) = admin();
        let admin_ids = resolver.admin_ids().map(str::to_string).collect();
        let identities: Vec<_> = resolve_counterparts(&store, &admin_ids)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.identity)
            .collect();
        assert_eq!(identities, vec!["x", "y"]);
    }

    #[tokio::test]
    async fn unresolvable_labels_drop_only_that_counterpart() {
        let store = MessageStore::in_memory().unwrap();
        register(&store, "x", Some("x@example.com")).await;
        register(&store, "blank", Some("   ")).await;
        seed(&store, "1", "x", 1).await;
        seed(&store, "2", "blank", 2).await;
        seed(&store, "3", "unknown", 3).await;
        seed(&store, "4", GUEST_IDENTITY, 4).await;

        let admin_ids = BTreeSet::from(["admin".to_string()]);
        let counterparts = resolve_counterparts(&store, &admin_ids).await.unwrap();
        assert_eq!(
            counterparts,
            vec![
                Counterpart {
                    identity: GUEST_IDENTITY.to_string(),
                    label: GUEST_IDENTITY.to_string(),
                },
                Counterpart {
                    identity: "x".to_string(),
                    label: "x@example.com".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn non_admins_cannot_list_conversations() {
        let store = MessageStore::in_memory().unwrap();
        let (_, resolver) = admin();
        let visitor = Identity::guest();
        assert!(matches!(
            subscribe_counterparts(&store, &visitor, &resolver),
            Err(ChatError::NotAdmin(_))
        ));
    }

    #[tokio::test]
    async fn list_follows_new_senders_and_directory_updates() {
        let store = MessageStore::in_memory().unwrap();
        let (identity, resolver) = admin();
        let mut sub = subscribe_counterparts(&store, &identity, &resolver).unwrap();
        let wait = Duration::from_secs(3);

        let initial = timeout(wait, sub.recv()).await.unwrap().unwrap().unwrap();
        assert!(initial.is_empty());

        seed(&store, "1", "z", 1).await;
        let unlabeled = timeout(wait, sub.recv()).await.unwrap().unwrap().unwrap();
        assert!(unlabeled.is_empty());

        register(&store, "z", Some("z@example.com")).await;
        let labeled = timeout(wait, sub.recv()).await.unwrap().unwrap().unwrap();
        assert_eq!(labeled.len(), 1);
        assert_eq!(labeled[0].label, "z@example.com");
    }
}
