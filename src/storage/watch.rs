use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::error::StoreError;

use super::message_store::{Collection, MessageStore};

const SNAPSHOT_CHANNEL_CAPACITY: usize = 16;
const RETRY_INITIAL: Duration = Duration::from_millis(100);
const RETRY_MAX: Duration = Duration::from_secs(5);

/// Handle to a live query.
///
/// Every relevant store mutation produces a fresh full snapshot. Failed
/// evaluations are delivered as `Err` and retried with backoff. Dropping the
/// handle cancels the query.
pub struct Subscription<T> {
    receiver: mpsc::Receiver<Result<T, StoreError>>,
    task: JoinHandle<()>,
}

impl<T> Subscription<T> {
    /// Next snapshot; `None` once the query has stopped.
    pub async fn recv(&mut self) -> Option<Result<T, StoreError>> {
        self.receiver.recv().await
    }

    pub fn unsubscribe(self) {
        // Drop aborts the task.
    }
}

/// Next snapshot of an optional subscription. Pends forever while there is
/// none, so it can sit in a `select!` loop.
pub async fn recv_or_pending<T>(
    subscription: Option<&mut Subscription<T>>,
) -> Option<Result<T, StoreError>> {
    match subscription {
        Some(subscription) => subscription.recv().await,
        None => std::future::pending().await,
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl<T> Stream for Subscription<T> {
    type Item = Result<T, StoreError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

/// Start a live query re-evaluated whenever one of `collections` changes.
///
/// `produce` receives a handle to the store for every evaluation.
pub fn watch<T, F, Fut>(
    store: &MessageStore,
    collections: &'static [Collection],
    mut produce: F,
) -> Subscription<T>
where
    T: Send + 'static,
    F: FnMut(MessageStore) -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, StoreError>> + Send + 'static,
{
    let (sender, receiver) = mpsc::channel(SNAPSHOT_CHANNEL_CAPACITY);
    // Registered before the first evaluation so no write can slip in between.
    let mut changes = store.changes();
    let store = store.clone();

    let task = tokio::spawn(async move {
        let mut backoff = RETRY_INITIAL;
        loop {
            match produce(store.clone()).await {
                Ok(snapshot) => {
                    backoff = RETRY_INITIAL;
                    if sender.send(Ok(snapshot)).await.is_err() {
                        break;
                    }
                }
                Err(err) => {
                    log::warn!("Live query failed, retrying in {backoff:?}: {err}");
                    if sender.send(Err(err)).await.is_err() {
                        break;
                    }
                    sleep(backoff).await;
                    backoff = (backoff * 2).min(RETRY_MAX);
                    if sender.is_closed() {
                        break;
                    }
                    continue;
                }
            }

            if wait_for(&mut changes, collections).await.is_none() {
                break;
            }
        }
        log::trace!("Live query on {collections:?} stopped");
    });

    Subscription { receiver, task }
}

async fn wait_for(
    receiver: &mut broadcast::Receiver<Collection>,
    collections: &[Collection],
) -> Option<()> {
    loop {
        match receiver.recv().await {
            Ok(change) if collections.contains(&change) => break,
            Ok(_) => continue,
            // Missed notices may have touched our collections.
            Err(broadcast::error::RecvError::Lagged(_)) => break,
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }

    // Drain the receiver
    while receiver.try_recv().is_ok() {}

    Some(())
}
