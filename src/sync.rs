//! Live views: a local, wholesale-replaced copy of one live query.
//!
//! A [`LiveView`] moves `Idle -> Subscribing -> Synced`, replaces its
//! snapshot on every push, and ends in `Failed` if the channel reports an
//! error. Failures are not retried; a fresh [`LiveView::subscribe`] is the
//! only way back. Unsubscribing (or dropping the view) cancels the store
//! listener before returning.

use std::sync::Arc;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::{sync::watch, task::JoinHandle};

use crate::store::{CancelHandle, Document, DocumentStore, Push, Query, Subscription};

/// A decoded document together with its store key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doc<T> {
    pub id: String,
    #[serde(flatten)]
    pub data: T,
}

impl<T: DeserializeOwned> Doc<T> {
    pub fn decode(doc: Document) -> Result<Self, serde_json::Error> {
        Ok(Doc { id: doc.id, data: serde_json::from_value(Value::Object(doc.data))? })
    }
}

/// One full result set. `version` counts pushes received by the view and
/// identifies the snapshot.
#[derive(Debug)]
pub struct Snapshot<T> {
    pub version: u64,
    pub items: Arc<Vec<Doc<T>>>,
}

impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Snapshot { version: self.version, items: Arc::clone(&self.items) }
    }
}

#[derive(Debug)]
pub enum SyncState<T> {
    Idle,
    Subscribing,
    Synced(Snapshot<T>),
    Failed(String),
}

impl<T> Clone for SyncState<T> {
    fn clone(&self) -> Self {
        match self {
            SyncState::Idle => SyncState::Idle,
            SyncState::Subscribing => SyncState::Subscribing,
            SyncState::Synced(snapshot) => SyncState::Synced(snapshot.clone()),
            SyncState::Failed(reason) => SyncState::Failed(reason.clone()),
        }
    }
}

impl<T> SyncState<T> {
    pub fn snapshot(&self) -> Option<&Snapshot<T>> {
        match self {
            SyncState::Synced(snapshot) => Some(snapshot),
            _ => None,
        }
    }

    /// Whether more pushes can still change this state.
    pub fn is_settled(&self) -> bool {
        matches!(self, SyncState::Idle | SyncState::Failed(_))
    }
}

struct Slot<T> {
    epoch: u64,
    pushes: u64,
    state: SyncState<T>,
}

pub struct LiveView<T> {
    slot: Arc<watch::Sender<Slot<T>>>,
    rx: watch::Receiver<Slot<T>>,
    epoch: u64,
    cancel: Option<CancelHandle>,
    pump: Option<JoinHandle<()>>,
}

impl<T> Default for LiveView<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LiveView<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(Slot { epoch: 0, pushes: 0, state: SyncState::Idle });
        LiveView { slot: Arc::new(tx), rx, epoch: 0, cancel: None, pump: None }
    }

    /// Opens `query`, replacing whatever this view was following before.
    pub async fn subscribe(&mut self, store: &dyn DocumentStore, query: Query) {
        self.unsubscribe();
        let epoch = self.epoch;
        let collection = query.collection.clone();
        self.slot.send_modify(|slot| slot.state = SyncState::Subscribing);

        let subscription = match store.subscribe(query).await {
            Ok(subscription) => subscription,
            Err(err) => {
                tracing::warn!(%collection, error = %err, "subscription rejected");
                self.apply(epoch, Err(err));
                return;
            }
        };

        tracing::debug!(%collection, "live view subscribed");
        self.cancel = Some(subscription.cancel_handle());
        self.pump = Some(tokio::spawn(pump(Arc::clone(&self.slot), epoch, subscription)));
    }

    /// Cancels the store listener and returns to `Idle`. Later pushes from
    /// the old subscription are ignored.
    pub fn unsubscribe(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        self.epoch += 1;
        let epoch = self.epoch;
        self.slot.send_modify(|slot| {
            slot.epoch = epoch;
            slot.state = SyncState::Idle;
        });
    }

    fn apply(&self, epoch: u64, push: Push) {
        deliver(&self.slot, epoch, push);
    }

    pub fn state(&self) -> SyncState<T> {
        self.rx.borrow().state.clone()
    }

    /// Waits for the next state change and returns the new state.
    pub async fn changed(&mut self) -> SyncState<T> {
        // the view owns a sender, so the channel never closes under us
        let _ = self.rx.changed().await;
        self.rx.borrow_and_update().state.clone()
    }

    /// Waits until the view is synced or settled, returning that state.
    pub async fn ready(&mut self) -> SyncState<T> {
        loop {
            let state = self.rx.borrow_and_update().state.clone();
            if matches!(state, SyncState::Synced(_)) || state.is_settled() {
                return state;
            }
            let _ = self.rx.changed().await;
        }
    }
}

impl<T> Drop for LiveView<T> {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

fn deliver<T: DeserializeOwned>(slot: &watch::Sender<Slot<T>>, epoch: u64, push: Push) {
    slot.send_if_modified(|slot| {
        if slot.epoch != epoch {
            return false;
        }
        slot.state = match push {
            Ok(docs) => {
                slot.pushes += 1;
                let items = docs
                    .into_iter()
                    .filter_map(|doc| {
                        let id = doc.id.clone();
                        Doc::decode(doc)
                            .inspect_err(|err| tracing::warn!(%id, error = %err, "skipping undecodable document"))
                            .ok()
                    })
                    .collect();
                SyncState::Synced(Snapshot { version: slot.pushes, items: Arc::new(items) })
            }
            Err(err) => SyncState::Failed(err.to_string()),
        };
        true
    });
}

async fn pump<T: DeserializeOwned>(slot: Arc<watch::Sender<Slot<T>>>, epoch: u64, mut subscription: Subscription) {
    while let Some(push) = subscription.next_push().await {
        let failed = push.is_err();
        deliver(&slot, epoch, push);
        if failed {
            break;
        }
    }
}
