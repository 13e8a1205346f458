use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use tokio::sync::Mutex;

use super::{
    CollectionPath, Document, DocumentStore, Listeners, Query, SetOptions, StoreError,
    StoreResult, Subscription, check_key, merge_into, new_key, now_millis, prepare,
};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    key TEXT NOT NULL,
    data TEXT NOT NULL,
    PRIMARY KEY (collection, key)
)";

/// Documents persisted as JSON rows in SQLite.
///
/// Live queries are re-evaluated after each write. Writes, subscription
/// setup and the notifications that follow them run under `write_lock`, so
/// a listener never observes pushes out of write order.
#[derive(Clone)]
pub struct SqliteStore {
    db_pool: SqlitePool,
    listeners: Listeners,
    write_lock: std::sync::Arc<Mutex<()>>,
}

impl SqliteStore {
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let db_pool = SqlitePoolOptions::new()
            .max_connections(16)
            .connect(url)
            .await?;
        Self::from_pool(db_pool).await
    }

    pub async fn from_pool(db_pool: SqlitePool) -> StoreResult<Self> {
        sqlx::query(SCHEMA).execute(&db_pool).await?;
        Ok(SqliteStore {
            db_pool,
            listeners: Listeners::default(),
            write_lock: Default::default(),
        })
    }

    async fn load(&self, collection: &CollectionPath) -> StoreResult<Vec<Document>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT key,data FROM documents WHERE collection=?")
                .bind(collection.as_str())
                .fetch_all(&self.db_pool)
                .await?;

        rows.into_iter()
            .map(|(id, data)| Ok(Document { id, data: decode(&data)? }))
            .collect()
    }

    async fn load_one(&self, collection: &CollectionPath, key: &str) -> StoreResult<Option<Document>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT data FROM documents WHERE collection=? AND key=?")
                .bind(collection.as_str())
                .bind(key)
                .fetch_optional(&self.db_pool)
                .await?;

        row.map(|(data,)| Ok(Document { id: key.to_owned(), data: decode(&data)? }))
            .transpose()
    }

    async fn store(&self, collection: &CollectionPath, key: &str, data: &Map<String, Value>) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO documents (collection,key,data) VALUES (?,?,?)
             ON CONFLICT(collection,key) DO UPDATE SET data=excluded.data",
        )
        .bind(collection.as_str())
        .bind(key)
        .bind(serde_json::to_string(data)?)
        .execute(&self.db_pool)
        .await?;
        Ok(())
    }

    async fn notify(&self, collection: &CollectionPath) {
        let watching = self.listeners.watching(collection);
        if watching.is_empty() {
            return;
        }
        let docs = self.load(collection).await;
        for (id, query) in watching {
            let push = match &docs {
                Ok(docs) => Ok(query.apply(docs.iter().cloned())),
                Err(err) => {
                    tracing::warn!(%collection, error = %err, "re-query for listener failed");
                    Err(StoreError::Unavailable(err.to_string()))
                }
            };
            self.listeners.push(id, push);
        }
    }
}

fn decode(raw: &str) -> StoreResult<Map<String, Value>> {
    match serde_json::from_str(raw)? {
        Value::Object(map) => Ok(map),
        _ => Err(StoreError::InvalidDocument("stored row is not an object".into())),
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn add(&self, collection: &CollectionPath, data: Value) -> StoreResult<String> {
        let data = prepare(data, now_millis())?;
        let key = new_key();

        let _guard = self.write_lock.lock().await;
        self.store(collection, &key, &data).await?;
        self.notify(collection).await;
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

        let _guard = self.write_lock.lock().await;
        let data = match self.load_one(collection, key).await? {
            Some(mut existing) if options.merge => {
                merge_into(&mut existing.data, data);
                existing.data
            }
            _ => data,
        };
        self.store(collection, key, &data).await?;
        self.notify(collection).await;
        Ok(())
    }

    async fn get(&self, collection: &CollectionPath, key: &str) -> StoreResult<Option<Document>> {
        check_key(key)?;
        self.load_one(collection, key).await
    }

    async fn subscribe(&self, query: Query) -> StoreResult<Subscription> {
        let _guard = self.write_lock.lock().await;
        let initial = query.apply(self.load(&query.collection).await?);
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

    async fn store() -> SqliteStore {
        // a single connection keeps the in-memory database alive and shared
        let db_pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        SqliteStore::from_pool(db_pool).await.unwrap()
    }

    #[tokio::test]
    async fn round_trips_and_merges() {
        let store = store().await;
        let profiles = paths::profiles();
        store
            .set(&profiles, "u1", json!({ "username": "Ana", "profile": "Consultor" }), SetOptions::merge())
            .await
            .unwrap();
        store
            .set(&profiles, "u1", json!({ "username": "Ana", "lastUpdated": server_timestamp() }), SetOptions::merge())
            .await
            .unwrap();

        let doc = store.get(&profiles, "u1").await.unwrap().unwrap();
        assert_eq!(doc.get("profile"), Some(&json!("Consultor")));
        assert!(doc.get("lastUpdated").unwrap().is_i64());
        assert!(store.get(&profiles, "nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn live_queries_follow_writes() {
        let store = store().await;
        let comments = paths::comments("t1").unwrap();
        let mut sub = store
            .subscribe(Query::new(comments.clone()).order_by("createdAt", Direction::Ascending))
            .await
            .unwrap();
        assert!(sub.next_push().await.unwrap().unwrap().is_empty());

        store.add(&comments, json!({ "text": "first", "createdAt": server_timestamp() })).await.unwrap();
        let push = sub.next_push().await.unwrap().unwrap();
        assert_eq!(push.len(), 1);
        assert_eq!(push[0].get("text"), Some(&json!("first")));

        drop(sub);
        assert_eq!(store.listener_count(), 0);
    }
}
