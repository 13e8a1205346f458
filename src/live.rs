//! Live views over WebSockets: every snapshot is rendered and sent as a
//! complete HTML fragment, which the page swaps in wholesale.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;

use crate::{
    store::{DocumentStore, Query},
    sync::{Doc, LiveView, SyncState},
};

/// Subscribes, takes the first result set and lets the subscription go.
pub async fn first_snapshot<T>(store: &dyn DocumentStore, query: Query) -> Result<Arc<Vec<Doc<T>>>, String>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    let mut view = LiveView::<T>::new();
    view.subscribe(store, query).await;
    let state = view.ready().await;
    view.unsubscribe();
    match state {
        SyncState::Synced(snapshot) => Ok(snapshot.items),
        SyncState::Failed(reason) => Err(reason),
        SyncState::Idle | SyncState::Subscribing => Err("subscription closed".to_owned()),
    }
}

/// Streams `query` to the socket until the client goes away.
///
/// Text frames from the client replace the current filter text; the
/// renderer gets it with every state so it can project the snapshot.
pub async fn pump_view<T, F>(socket: WebSocket, store: Arc<dyn DocumentStore>, query: Query, mut render: F)
where
    T: DeserializeOwned + Send + Sync + 'static,
    F: FnMut(&SyncState<T>, &str) -> String + Send,
{
    let collection = query.collection.clone();
    let mut view = LiveView::<T>::new();
    view.subscribe(store.as_ref(), query).await;

    let (mut sender, mut receiver) = socket.split();
    let mut needle = String::new();
    let mut state = view.ready().await;
    let mut dirty = true;

    loop {
        if dirty && sender.send(Message::Text(render(&state, &needle).into())).await.is_err() {
            break;
        }

        tokio::select! {
            next = view.changed() => {
                state = next;
                dirty = true;
            }
            msg = receiver.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    needle = text.as_str().to_owned();
                    dirty = true;
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => dirty = false,
            },
        }
    }

    view.unsubscribe();
    tracing::debug!(%collection, "live socket closed");
}

/// Renders a state with `list` once synced.
pub fn render_state<T>(
    state: &SyncState<T>,
    failed: &str,
    list: impl FnOnce(&[Doc<T>]) -> String,
) -> String {
    match state {
        SyncState::Synced(snapshot) => list(&snapshot.items),
        SyncState::Failed(_) => crate::res::status(Some(failed), false),
        SyncState::Idle | SyncState::Subscribing => r#"<p class="loading">Carregando...</p>"#.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        models::ForumComment,
        store::{Direction, InMemoryStore, paths, server_timestamp},
    };

    #[tokio::test]
    async fn first_snapshot_releases_its_listener() {
        let store = InMemoryStore::new();
        let comments = paths::comments("t1").unwrap();
        store
            .add(&comments, json!({ "text": "oi", "createdAt": server_timestamp() }))
            .await
            .unwrap();

        let items = first_snapshot::<ForumComment>(
            &store,
            Query::new(comments).order_by("createdAt", Direction::Ascending),
        )
        .await
        .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(store.listener_count(), 0);
    }

    #[tokio::test]
    async fn first_snapshot_reports_failures() {
        let store = InMemoryStore::new();
        store.deny("forum-threads");
        let result = first_snapshot::<ForumComment>(&store, Query::new(paths::comments("t1").unwrap())).await;
        assert!(result.is_err());
    }

    #[test]
    fn states_render_placeholders() {
        let loading: SyncState<ForumComment> = SyncState::Subscribing;
        assert!(render_state(&loading, "x", |_| String::new()).contains("Carregando"));
        let failed: SyncState<ForumComment> = SyncState::Failed("denied".into());
        assert!(render_state(&failed, "Falhou.", |_| String::new()).contains("Falhou."));
    }
}
