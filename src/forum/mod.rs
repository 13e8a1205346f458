mod comment;
mod list;
mod new;
mod thread;

use axum::{Router, routing::get};

use crate::{
    AppState, include_res,
    models::{ForumComment, ForumThread, format_date},
    res,
    store::{Direction, Query, StoreResult, paths},
    sync::Doc,
};

pub use comment::{CommentForm, submit_comment};
pub use new::{ThreadForm, submit_thread};

const EXCERPT_CHARS: usize = 150;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list::forum).post(new::create_thread))
        .route("/ws", get(list::forum_ws))
        .route("/{thread_id}", get(thread::thread).post(comment::create_comment))
        .route("/{thread_id}/ws", get(thread::thread_ws))
}

/// Every thread, newest first.
pub fn threads_query() -> Query {
    Query::new(paths::forum_threads()).order_by("createdAt", Direction::Descending)
}

/// Comments of one thread, oldest first.
pub fn comments_query(thread_id: &str) -> StoreResult<Query> {
    Ok(Query::new(paths::comments(thread_id)?).order_by("createdAt", Direction::Ascending))
}

fn author(name: Option<&str>) -> String {
    res::escape(name.unwrap_or("Anônimo"))
}

pub(crate) fn render_threads(items: &[Doc<ForumThread>]) -> String {
    if items.is_empty() {
        return r#"<p class="empty">Nenhum tópico encontrado.</p>"#.to_owned();
    }

    items
        .iter()
        .map(|Doc { id, data: thread }| {
            include_res!(str, "/pages/forum/thread_item.html")
                .replace("{id}", &res::escape(id))
                .replace("{title}", &res::escape(&thread.title))
                .replace("{author}", &author(thread.author_username.as_deref()))
                .replace("{date}", &format_date(thread.created_at))
                .replace("{excerpt}", &res::escape(&res::excerpt(&thread.main_comment, EXCERPT_CHARS)))
        })
        .collect()
}

pub(crate) fn render_comments(items: &[Doc<ForumComment>]) -> String {
    let list: String = items
        .iter()
        .map(|Doc { id, data: comment }| {
            include_res!(str, "/pages/forum/comment_item.html")
                .replace("{id}", &res::escape(id))
                .replace("{author}", &author(comment.author_username.as_deref()))
                .replace("{date}", &format_date(comment.created_at))
                .replace("{text}", &res::markdown(&comment.text))
        })
        .collect();

    format!(
        r#"<h3>Respostas ({})</h3>{}"#,
        items.len(),
        if list.is_empty() { r#"<p class="empty">Seja o primeiro a responder.</p>"#.to_owned() } else { list }
    )
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        live,
        store::{DocumentStore, InMemoryStore, SetOptions},
        sync::{LiveView, SyncState},
    };

    async fn with_profile(store: &InMemoryStore, user_id: &str, username: &str) {
        store
            .set(
                &paths::profiles(),
                user_id,
                json!({ "username": username, "profile": "Investidor", "userId": user_id }),
                SetOptions::merge(),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn comments_reach_their_own_subscription_only() {
        let store = InMemoryStore::new();
        with_profile(&store, "u1", "Ana").await;

        let mut threads = LiveView::<ForumThread>::new();
        threads.subscribe(&store, threads_query()).await;
        threads.ready().await;

        let form = ThreadForm { title: "Renda Fixa Hoje".into(), main_comment: "CDB ou LCI?".into(), image_url: String::new() };
        let thread_id = submit_thread(&store, Some("u1"), &form).await.unwrap();
        let after_thread = threads.changed().await;
        let version = after_thread.snapshot().unwrap().version;

        let mut comments = LiveView::<ForumComment>::new();
        comments.subscribe(&store, comments_query(&thread_id).unwrap()).await;
        assert!(comments.ready().await.snapshot().unwrap().items.is_empty());

        let reply = CommentForm { text: "LCI, isenta de IR.".into() };
        submit_comment(&store, Some("u1"), &thread_id, &reply).await.unwrap();

        let state = comments.changed().await;
        let items = &state.snapshot().unwrap().items;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].data.author_username.as_deref(), Some("Ana"));

        // the thread list never saw the comment
        match threads.state() {
            SyncState::Synced(snapshot) => assert_eq!(snapshot.version, version),
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[tokio::test]
    async fn author_names_are_copied_at_write_time() {
        let store = InMemoryStore::new();
        with_profile(&store, "u1", "Ana").await;
        let form = ThreadForm { title: "Ações".into(), main_comment: "Alta?".into(), image_url: String::new() };
        submit_thread(&store, Some("u1"), &form).await.unwrap();
        with_profile(&store, "u1", "Ana Paula").await;

        let items = live::first_snapshot::<ForumThread>(&store, threads_query()).await.unwrap();
        assert_eq!(items[0].data.author_username.as_deref(), Some("Ana"));
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn thread_list_shows_excerpts() {
        let long = "x".repeat(200);
        let html = render_threads(&[Doc {
            id: "t1".into(),
            data: ForumThread {
                title: "Título".into(),
                main_comment: long,
                image_url: None,
                author_id: None,
                author_username: None,
                created_at: None,
            },
        }]);
        assert!(html.contains(&format!("{}...", "x".repeat(150))));
        assert!(html.contains("Anônimo"));
        assert!(html.contains("/forum/t1"));
    }
}
