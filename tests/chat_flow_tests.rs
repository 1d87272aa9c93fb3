use std::time::Duration;

use portfolio_chat::chat::{
    ChatWorker, Composer, Conversation, IdentityResolver, Session, SessionProvider, mark_read,
    subscribe_conversation, subscribe_counterparts, subscribe_unread,
};
use portfolio_chat::common::{
    ChatCommand, ChatEvent, ChatMessage, DirectoryEntry, GUEST_IDENTITY, Identity,
};
use portfolio_chat::storage::{MessageStore, Subscription};
use tokio::sync::mpsc;
use tokio::time::timeout;

const ADMIN: &str = "YNuDWPPdWyezhPSeRqiS3VPLPfN2";
const WAIT: Duration = Duration::from_secs(3);

fn resolver() -> IdentityResolver {
    IdentityResolver::new([ADMIN])
}

fn admin_identity() -> Identity {
    resolver().resolve(Some(&Session::new(ADMIN)))
}

/// Receive snapshots until one satisfies `accept`.
async fn snapshot_where<T>(sub: &mut Subscription<T>, mut accept: impl FnMut(&T) -> bool) -> T {
    timeout(WAIT, async {
        loop {
            let snapshot = sub
                .recv()
                .await
                .expect("subscription stopped")
                .expect("live query failed");
            if accept(&snapshot) {
                return snapshot;
            }
        }
    })
    .await
    .expect("no matching snapshot in time")
}

fn texts(messages: &[ChatMessage]) -> Vec<&str> {
    messages.iter().map(|m| m.text.as_str()).collect()
}

#[tokio::test]
async fn guest_and_admin_exchange_messages() {
    let store = MessageStore::in_memory().unwrap();
    let guest = resolver().resolve(None);
    assert_eq!(guest.id, GUEST_IDENTITY);
    let admin = admin_identity();
    assert!(admin.is_admin);

    let mut visitor_composer = Composer::new(store.clone(), guest.clone(), Some(ADMIN.to_string()));
    visitor_composer.draft_mut().push_str("hello");
    visitor_composer.submit().await.unwrap().unwrap();

    let mut admin_view =
        subscribe_conversation(&store, Conversation::new(GUEST_IDENTITY, &resolver()));
    let seen_by_admin = snapshot_where(&mut admin_view, |m| !m.is_empty()).await;
    assert_eq!(seen_by_admin.len(), 1);
    assert_eq!(seen_by_admin[0].text, "hello");
    assert_eq!(seen_by_admin[0].sender, GUEST_IDENTITY);

    let mut admin_composer = Composer::new(store.clone(), admin, Some(GUEST_IDENTITY.to_string()));
    admin_composer.draft_mut().push_str("hi");
    admin_composer.submit().await.unwrap().unwrap();

    let mut visitor_view =
        subscribe_conversation(&store, Conversation::between(&guest, ADMIN, &resolver()));
    let seen_by_visitor = snapshot_where(&mut visitor_view, |m| m.len() == 2).await;
    assert_eq!(texts(&seen_by_visitor), vec!["hello", "hi"]);
}

#[tokio::test]
async fn admin_replies_do_not_leak_into_other_conversations() {
    let store = MessageStore::in_memory().unwrap();
    let admin = admin_identity();
    for (visitor, text) in [("x", "from x"), ("y", "from y")] {
        let identity = resolver().resolve(Some(&Session::new(visitor)));
        let mut composer = Composer::new(store.clone(), identity, Some(ADMIN.to_string()));
        composer.draft_mut().push_str(text);
        composer.submit().await.unwrap();
    }
    let mut reply = Composer::new(store.clone(), admin, Some("x".to_string()));
    reply.draft_mut().push_str("only for x");
    reply.submit().await.unwrap();

    let mut y_view = subscribe_conversation(&store, Conversation::new("y", &resolver()));
    let y_messages = snapshot_where(&mut y_view, |m| !m.is_empty()).await;
    assert_eq!(texts(&y_messages), vec!["from y"]);

    let mut x_view = subscribe_conversation(&store, Conversation::new("x", &resolver()));
    let x_messages = snapshot_where(&mut x_view, |m| m.len() == 2).await;
    assert_eq!(texts(&x_messages), vec!["from x", "only for x"]);
}

#[tokio::test]
async fn admin_sees_conversations_and_unread_badge() {
    let store = MessageStore::in_memory().unwrap();
    for (id, email) in [("x", "x@example.com"), ("y", "y@example.com")] {
        store
            .upsert_user(&DirectoryEntry {
                id: id.to_string(),
                email: Some(email.to_string()),
            })
            .await
            .unwrap();
    }

    let admin = admin_identity();
    let mut counterparts = subscribe_counterparts(&store, &admin, &resolver()).unwrap();
    let mut unread = subscribe_unread(&store);

    let mut sent_ids = Vec::new();
    for visitor in ["y", "x", "y"] {
        let identity = resolver().resolve(Some(&Session::new(visitor)));
        let mut composer = Composer::new(store.clone(), identity, Some(ADMIN.to_string()));
        composer.draft_mut().push_str("ping");
        sent_ids.push(composer.submit().await.unwrap().unwrap().id);
    }
    let mut own = Composer::new(store.clone(), admin.clone(), Some("x".to_string()));
    own.draft_mut().push_str("pong");
    own.submit().await.unwrap();

    let list = snapshot_where(&mut counterparts, |list| list.len() == 2).await;
    let identities: Vec<_> = list.iter().map(|c| c.identity.as_str()).collect();
    assert_eq!(identities, vec!["x", "y"]);
    assert_eq!(list[0].label, "x@example.com");

    snapshot_where(&mut unread, |count| *count == 4).await;
    mark_read(&store, &admin, &sent_ids[2]).await.unwrap();
    snapshot_where(&mut unread, |count| *count == 3).await;
}

#[tokio::test]
async fn worker_routes_admin_selection() {
    let store = MessageStore::in_memory().unwrap();
    store
        .upsert_user(&DirectoryEntry {
            id: "x".to_string(),
            email: Some("x@example.com".to_string()),
        })
        .await
        .unwrap();
    let visitor = resolver().resolve(Some(&Session::new("x")));
    let mut composer = Composer::new(store.clone(), visitor, Some(ADMIN.to_string()));
    composer.draft_mut().push_str("need help");
    composer.submit().await.unwrap();

    let sessions = SessionProvider::new(Some(Session::new(ADMIN)));
    let (cmd_tx, cmd_rx) = mpsc::channel(16);
    let (event_tx, mut event_rx) = mpsc::channel(64);
    let worker = ChatWorker::new(
        store.clone(),
        resolver(),
        Some(ADMIN.to_string()),
        sessions.changes(),
        event_tx,
        cmd_rx,
    );
    tokio::spawn(worker.run());

    cmd_tx
        .send(ChatCommand::SelectConversation("x".to_string()))
        .await
        .unwrap();
    cmd_tx
        .send(ChatCommand::SendMessage("on it".to_string()))
        .await
        .unwrap();

    let conversation = timeout(WAIT, async {
        loop {
            match event_rx.recv().await.expect("worker stopped") {
                ChatEvent::MessagesUpdated {
                    counterpart: Some(counterpart),
                    messages,
                } if messages.len() == 2 => return (counterpart, messages),
                _ => continue,
            }
        }
    })
    .await
    .expect("conversation update not received");

    assert_eq!(conversation.0, "x");
    assert_eq!(texts(&conversation.1), vec!["need help", "on it"]);
    assert_eq!(conversation.1[1].recipient.as_deref(), Some("x"));
}

#[tokio::test]
async fn every_configured_admin_shares_the_visitor_thread() {
    let store = MessageStore::in_memory().unwrap();
    let staff = IdentityResolver::new(["owner", "helper"]);
    let guest = staff.resolve(None);
    let helper = staff.resolve(Some(&Session::new("helper")));
    assert!(helper.is_admin);

    let mut visitor_composer =
        Composer::new(store.clone(), guest.clone(), Some("owner".to_string()));
    visitor_composer.draft_mut().push_str("hello");
    visitor_composer.submit().await.unwrap().unwrap();

    let mut helper_list = subscribe_counterparts(&store, &helper, &staff).unwrap();
    let listed = snapshot_where(&mut helper_list, |list| !list.is_empty()).await;
    assert_eq!(listed[0].identity, GUEST_IDENTITY);

    let mut helper_view =
        subscribe_conversation(&store, Conversation::between(&helper, GUEST_IDENTITY, &staff));
    let seen = snapshot_where(&mut helper_view, |m| !m.is_empty()).await;
    assert_eq!(texts(&seen), vec!["hello"]);

    let mut reply = Composer::new(store.clone(), helper, Some(GUEST_IDENTITY.to_string()));
    reply.draft_mut().push_str("hi from helper");
    reply.submit().await.unwrap().unwrap();

    let mut visitor_view =
        subscribe_conversation(&store, Conversation::between(&guest, "owner", &staff));
    let thread = snapshot_where(&mut visitor_view, |m| m.len() == 2).await;
    assert_eq!(texts(&thread), vec!["hello", "hi from helper"]);
}
