use std::{
    collections::HashMap,
    pin::Pin,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError, Weak,
        atomic::{AtomicBool, Ordering},
    },
    task::{Context, Poll},
};

use futures_util::Stream;
use tokio::sync::mpsc;

use super::{CollectionPath, Document, Query, StoreError};

/// One delivery of a live query: the complete result set, or the error
/// that ended the subscription.
pub type Push = Result<Vec<Document>, StoreError>;

struct Listener {
    query: Query,
    tx: mpsc::UnboundedSender<Push>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    entries: HashMap<u64, Listener>,
}

/// Live listeners of one store.
#[derive(Clone, Default)]
pub(crate) struct Listeners {
    inner: Arc<Mutex<Registry>>,
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Listeners {
    pub(crate) fn register(&self, query: Query) -> (u64, Subscription) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut registry = lock(&self.inner);
        registry.next_id += 1;
        let id = registry.next_id;
        registry.entries.insert(id, Listener { query, tx });

        let cancel = CancelHandle {
            id,
            registry: Arc::downgrade(&self.inner),
            cancelled: Arc::new(AtomicBool::new(false)),
        };
        (id, Subscription { rx, cancel })
    }

    /// Listeners whose query reads `collection`.
    pub(crate) fn watching(&self, collection: &CollectionPath) -> Vec<(u64, Query)> {
        lock(&self.inner)
            .entries
            .iter()
            .filter(|(_, l)| &l.query.collection == collection)
            .map(|(id, l)| (*id, l.query.clone()))
            .collect()
    }

    /// Listeners whose collection lives under `prefix`.
    pub(crate) fn under(&self, prefix: &str) -> Vec<u64> {
        lock(&self.inner)
            .entries
            .iter()
            .filter(|(_, l)| l.query.collection.starts_with(prefix))
            .map(|(id, _)| *id)
            .collect()
    }

    pub(crate) fn push(&self, id: u64, push: Push) {
        let mut registry = lock(&self.inner);
        let terminal = push.is_err();
        let delivered = match registry.entries.get(&id) {
            Some(listener) => listener.tx.send(push).is_ok(),
            None => return,
        };
        if terminal || !delivered {
            registry.entries.remove(&id);
        }
    }

    pub(crate) fn len(&self) -> usize {
        lock(&self.inner).entries.len()
    }
}

/// Cancels a subscription from outside the task that consumes it.
#[derive(Clone)]
pub struct CancelHandle {
    id: u64,
    registry: Weak<Mutex<Registry>>,
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Removes the listener from the store. Idempotent.
    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).entries.remove(&self.id);
            tracing::debug!(listener = self.id, "listener cancelled");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Stream of full result sets for one live query. Dropping it cancels the
/// listener.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Push>,
    cancel: CancelHandle,
}

impl Subscription {
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Unregisters the listener and discards anything still buffered.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
    }

    pub async fn next_push(&mut self) -> Option<Push> {
        futures_util::StreamExt::next(self).await
    }
}

impl Stream for Subscription {
    type Item = Push;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Push>> {
        if self.cancel.is_cancelled() {
            return Poll::Ready(None);
        }
        self.rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::paths;

    #[tokio::test]
    async fn pushes_arrive_in_order() {
        let listeners = Listeners::default();
        let (id, mut sub) = listeners.register(Query::new(paths::forum_threads()));
        listeners.push(id, Ok(vec![]));
        listeners.push(
            id,
            Ok(vec![Document { id: "a".into(), data: Default::default() }]),
        );

        assert_eq!(sub.next_push().await.unwrap().unwrap().len(), 0);
        assert_eq!(sub.next_push().await.unwrap().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn cancel_drops_buffered_pushes() {
        let listeners = Listeners::default();
        let (id, mut sub) = listeners.register(Query::new(paths::forum_threads()));
        listeners.push(id, Ok(vec![]));
        sub.cancel();

        assert_eq!(listeners.len(), 0);
        assert!(sub.next_push().await.is_none());
    }

    #[tokio::test]
    async fn errors_end_the_listener() {
        let listeners = Listeners::default();
        let (id, mut sub) = listeners.register(Query::new(paths::profiles()));
        listeners.push(id, Err(StoreError::Unavailable("offline".into())));

        assert_eq!(listeners.len(), 0);
        assert!(sub.next_push().await.unwrap().is_err());
        assert!(sub.next_push().await.is_none());
    }

    #[test]
    fn dropping_a_subscription_unregisters_it() {
        let listeners = Listeners::default();
        let (_, sub) = listeners.register(Query::new(paths::profiles()));
        let handle = sub.cancel_handle();
        assert_eq!(listeners.len(), 1);
        drop(sub);
        assert_eq!(listeners.len(), 0);
        assert!(handle.is_cancelled());
    }
}
