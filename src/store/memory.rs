use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{
    CollectionPath, Document, DocumentStore, Listeners, Query, SetOptions, StoreError,
    StoreResult, Subscription, check_key, merge_into, new_key, now_millis, prepare,
};

#[derive(Default)]
struct State {
    collections: HashMap<CollectionPath, BTreeMap<String, Map<String, Value>>>,
    denied: Vec<String>,
}

impl State {
    fn check_access(&self, collection: &CollectionPath) -> StoreResult<()> {
        match self.denied.iter().find(|p| collection.starts_with(p)) {
            Some(prefix) => Err(StoreError::PermissionDenied(format!(
                "{collection} is covered by a deny rule on {prefix}"
            ))),
            None => Ok(()),
        }
    }

    fn run(&self, query: &Query) -> Vec<Document> {
        let docs = self
            .collections
            .get(&query.collection)
            .into_iter()
            .flatten()
            .map(|(id, data)| Document { id: id.clone(), data: data.clone() });
        query.apply(docs)
    }
}

/// Process-local store. State and listener notification share one lock, so
/// every listener sees writes in the order they were applied.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
    listeners: Listeners,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Rejects every read and write under `prefix` from now on, and fails the
    /// live listeners already open there.
    pub fn deny(&self, prefix: &str) {
        let mut state = self.lock();
        state.denied.push(prefix.to_owned());
        for id in self.listeners.under(prefix) {
            self.listeners.push(
                id,
                Err(StoreError::PermissionDenied(format!("access to {prefix} revoked"))),
            );
        }
    }

    fn notify(&self, state: &State, collection: &CollectionPath) {
        for (id, query) in self.listeners.watching(collection) {
            self.listeners.push(id, Ok(state.run(&query)));
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn add(&self, collection: &CollectionPath, data: Value) -> StoreResult<String> {
        let data = prepare(data, now_millis())?;
        let mut state = self.lock();
        state.check_access(collection)?;

        let key = new_key();
        state
            .collections
            .entry(collection.clone())
            .or_default()
            .insert(key.clone(), data);
        self.notify(&state, collection);
        Ok(key)
    }

    async fn set(
        &self,
        collection: &CollectionPath,
        key: &str,
        data: Value,
        options: SetOptions,
    ) -> StoreResult<()> {
        check_key(key)?;
        let data = prepare(data, now_millis())?;
        let mut state = self.lock();
        state.check_access(collection)?;

        let docs = state.collections.entry(collection.clone()).or_default();
        match docs.get_mut(key) {
            Some(existing) if options.merge => merge_into(existing, data),
            _ => {
                docs.insert(key.to_owned(), data);
            }
        }
        self.notify(&state, collection);
        Ok(())
    }

    async fn get(&self, collection: &CollectionPath, key: &str) -> StoreResult<Option<Document>> {
        check_key(key)?;
        let state = self.lock();
        state.check_access(collection)?;
        Ok(state
            .collections
            .get(collection)
            .and_then(|docs| docs.get(key))
            .map(|data| Document { id: key.to_owned(), data: data.clone() }))
    }

    async fn subscribe(&self, query: Query) -> StoreResult<Subscription> {
        let state = self.lock();
        state.check_access(&query.collection)?;
        let initial = state.run(&query);
        let (id, subscription) = self.listeners.register(query);
        self.listeners.push(id, Ok(initial));
        Ok(subscription)
    }

    fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::{Direction, paths, server_timestamp};

    #[tokio::test]
    async fn merge_set_keeps_omitted_fields() {
        let store = InMemoryStore::new();
        let profiles = paths::profiles();
        store
            .set(&profiles, "u1", json!({ "username": "Ana", "profile": "Consultor" }), SetOptions::merge())
            .await
            .unwrap();
        store
            .set(&profiles, "u1", json!({ "username": "Ana" }), SetOptions::merge())
            .await
            .unwrap();

        let doc = store.get(&profiles, "u1").await.unwrap().unwrap();
        assert_eq!(doc.get("profile"), Some(&json!("Consultor")));
        assert_eq!(doc.get("username"), Some(&json!("Ana")));
    }

    #[tokio::test]
    async fn plain_set_replaces() {
        let store = InMemoryStore::new();
        let profiles = paths::profiles();
        store.set(&profiles, "u1", json!({ "a": 1, "b": 2 }), SetOptions::default()).await.unwrap();
        store.set(&profiles, "u1", json!({ "a": 3 }), SetOptions::default()).await.unwrap();

        let doc = store.get(&profiles, "u1").await.unwrap().unwrap();
        assert_eq!(Value::Object(doc.data), json!({ "a": 3 }));
    }

    #[tokio::test]
    async fn subscribers_get_full_result_sets() {
        let store = InMemoryStore::new();
        let threads = paths::forum_threads();
        let mut sub = store
            .subscribe(Query::new(threads.clone()).order_by("createdAt", Direction::Ascending))
            .await
            .unwrap();
        assert!(sub.next_push().await.unwrap().unwrap().is_empty());

        store.add(&threads, json!({ "title": "one", "createdAt": server_timestamp() })).await.unwrap();
        store.add(&threads, json!({ "title": "two", "createdAt": server_timestamp() })).await.unwrap();

        assert_eq!(sub.next_push().await.unwrap().unwrap().len(), 1);
        let second = sub.next_push().await.unwrap().unwrap();
        let titles: Vec<_> = second.iter().map(|d| d.get("title").unwrap().clone()).collect();
        assert_eq!(titles, [json!("one"), json!("two")]);
    }

    #[tokio::test]
    async fn writes_elsewhere_do_not_notify() {
        let store = InMemoryStore::new();
        let mut sub = store.subscribe(Query::new(paths::forum_threads())).await.unwrap();
        sub.next_push().await.unwrap().unwrap();

        store.add(&paths::comments("t1").unwrap(), json!({ "text": "hi" })).await.unwrap();
        sub.cancel();
        assert!(sub.next_push().await.is_none());
    }

    #[tokio::test]
    async fn deny_fails_listeners_and_writes() {
        let store = InMemoryStore::new();
        let room = paths::chat_messages("a_b").unwrap();
        let mut sub = store.subscribe(Query::new(room.clone())).await.unwrap();
        sub.next_push().await.unwrap().unwrap();

        store.deny("private-chats");
        assert!(matches!(sub.next_push().await, Some(Err(StoreError::PermissionDenied(_)))));
        assert!(matches!(
            store.add(&room, json!({ "text": "x" })).await,
            Err(StoreError::PermissionDenied(_))
        ));
        assert!(store.subscribe(Query::new(room)).await.is_err());
        assert_eq!(store.listener_count(), 0);
    }
}
