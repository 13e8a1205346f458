//! Document store facade.
//!
//! Collections of key-addressed JSON documents with one-shot reads and
//! writes plus live queries that re-deliver the whole result set on every
//! change. Two backends implement [`DocumentStore`]: [`InMemoryStore`] and
//! [`SqliteStore`].

mod listeners;
mod memory;
mod query;
mod sqlite;

use std::fmt;

use async_trait::async_trait;
use serde::{Serialize, Serializer, ser::SerializeMap};
use serde_json::{Map, Value};
use uuid::Uuid;

pub use listeners::{CancelHandle, Push, Subscription};
pub use memory::InMemoryStore;
pub use query::{Direction, Filter, FilterOp, OrderBy, Query, compare_values};
pub use sqlite::SqliteStore;

pub(crate) use listeners::Listeners;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("invalid document: {0}")]
    InvalidDocument(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Path of a collection: `name` or `name/doc/name`, always an odd number of
/// segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionPath(String);

impl CollectionPath {
    pub fn new<I, S>(segments: I) -> StoreResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parts = Vec::new();
        for segment in segments {
            let segment = segment.as_ref();
            if segment.is_empty() || segment.contains('/') {
                return Err(StoreError::InvalidPath(format!("bad segment {segment:?}")));
            }
            parts.push(segment.to_owned());
        }
        if parts.len() % 2 == 0 {
            return Err(StoreError::InvalidPath(format!(
                "{} does not name a collection",
                parts.join("/")
            )));
        }
        Ok(CollectionPath(parts.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this path equals `prefix` or lives underneath it.
    pub fn starts_with(&self, prefix: &str) -> bool {
        let prefix = prefix.trim_end_matches('/');
        self.0 == prefix || self.0.starts_with(&format!("{prefix}/"))
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Well-known collections of the site.
pub mod paths {
    use super::{CollectionPath, StoreResult};

    pub fn articles(app_id: &str) -> StoreResult<CollectionPath> {
        CollectionPath::new(["artifacts", app_id, "public", "data", "articles"])
    }

    pub fn profiles() -> CollectionPath {
        CollectionPath("profiles".to_owned())
    }

    pub fn forum_threads() -> CollectionPath {
        CollectionPath("forum-threads".to_owned())
    }

    pub fn comments(thread_id: &str) -> StoreResult<CollectionPath> {
        CollectionPath::new(["forum-threads", thread_id, "comments"])
    }

    pub fn chat_messages(room_id: &str) -> StoreResult<CollectionPath> {
        CollectionPath::new(["private-chats", room_id, "messages"])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Map<String, Value>,
}

impl Document {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }
}

// Flat `{ "id": .., ...data }` like the documents clients render.
impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.data.len() + 1))?;
        map.serialize_entry("id", &self.id)?;
        for (k, v) in &self.data {
            if k != "id" {
                map.serialize_entry(k, v)?;
            }
        }
        map.end()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SetOptions {
    pub merge: bool,
}

impl SetOptions {
    pub fn merge() -> Self {
        SetOptions { merge: true }
    }
}

const SERVER_VALUE: &str = ".sv";

/// Placeholder resolved by the store to the write time, in Unix millis.
pub fn server_timestamp() -> Value {
    serde_json::json!({ SERVER_VALUE: "timestamp" })
}

pub(crate) fn now_millis() -> i64 {
    (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

pub(crate) fn new_key() -> String {
    Uuid::now_v7().simple().to_string()
}

/// Checks the payload is an object and resolves server values in it.
pub(crate) fn prepare(data: Value, now: i64) -> StoreResult<Map<String, Value>> {
    match resolve_server_values(data, now) {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::InvalidDocument(format!(
            "expected an object, got {other}"
        ))),
    }
}

fn resolve_server_values(value: Value, now: i64) -> Value {
    match value {
        Value::Object(map) => {
            if map.len() == 1 && map.get(SERVER_VALUE).and_then(Value::as_str) == Some("timestamp") {
                return Value::from(now);
            }
            Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, resolve_server_values(v, now)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|v| resolve_server_values(v, now))
                .collect(),
        ),
        other => other,
    }
}

/// Deep merge: objects merge key by key, anything else is overwritten.
pub(crate) fn merge_into(target: &mut Map<String, Value>, patch: Map<String, Value>) {
    for (key, value) in patch {
        match (target.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_into(existing, incoming);
            }
            (_, value) => {
                target.insert(key, value);
            }
        }
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Inserts a document under a store-assigned key and returns the key.
    async fn add(&self, collection: &CollectionPath, data: Value) -> StoreResult<String>;

    async fn set(
        &self,
        collection: &CollectionPath,
        key: &str,
        data: Value,
        options: SetOptions,
    ) -> StoreResult<()>;

    async fn get(&self, collection: &CollectionPath, key: &str) -> StoreResult<Option<Document>>;

    /// Opens a live query. The first push carries the current result set.
    async fn subscribe(&self, query: Query) -> StoreResult<Subscription>;

    /// Number of live listeners currently registered.
    fn listener_count(&self) -> usize;
}

pub(crate) fn check_key(key: &str) -> StoreResult<()> {
    if key.is_empty() || key.contains('/') {
        return Err(StoreError::InvalidPath(format!("bad document key {key:?}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn collection_paths_need_odd_segments() {
        assert!(CollectionPath::new(["forum-threads"]).is_ok());
        assert!(CollectionPath::new(["forum-threads", "abc"]).is_err());
        assert!(paths::comments("abc").is_ok());
        assert!(paths::comments("a/b").is_err());
        assert!(paths::comments("").is_err());
    }

    #[test]
    fn prefixes_match_whole_segments() {
        let path = paths::comments("t1").unwrap();
        assert!(path.starts_with("forum-threads"));
        assert!(path.starts_with("forum-threads/t1/"));
        assert!(!path.starts_with("forum"));
    }

    #[test]
    fn server_timestamps_resolve_anywhere() {
        let data = prepare(
            json!({ "createdAt": server_timestamp(), "nested": { "at": server_timestamp() } }),
            42,
        )
        .unwrap();
        assert_eq!(data["createdAt"], json!(42));
        assert_eq!(data["nested"]["at"], json!(42));
    }

    #[test]
    fn non_objects_are_rejected() {
        assert!(matches!(prepare(json!([1, 2]), 0), Err(StoreError::InvalidDocument(_))));
    }

    #[test]
    fn merge_keeps_missing_fields() {
        let mut target = json!({ "username": "Ana", "profile": "Consultor", "meta": { "a": 1 } })
            .as_object()
            .cloned()
            .unwrap();
        let patch = json!({ "username": "Ana Maria", "meta": { "b": 2 } })
            .as_object()
            .cloned()
            .unwrap();
        merge_into(&mut target, patch);
        assert_eq!(
            Value::Object(target),
            json!({ "username": "Ana Maria", "profile": "Consultor", "meta": { "a": 1, "b": 2 } })
        );
    }

    #[test]
    fn documents_serialize_flat() {
        let doc = Document {
            id: "k1".into(),
            data: json!({ "title": "x" }).as_object().cloned().unwrap(),
        };
        assert_eq!(serde_json::to_value(&doc).unwrap(), json!({ "id": "k1", "title": "x" }));
    }
}
