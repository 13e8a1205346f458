use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{Path, State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tower_sessions::Session;

use crate::{
    AppResult, AppState, include_res, live,
    forms::FormStatus,
    models::{ForumComment, ForumThread, format_date},
    profiles::{ProfileState, load_own_profile},
    res,
    session::current_user,
    store::{DocumentStore, StoreError, paths},
    sync::Doc,
};

use super::{CommentForm, comments_query, render_comments};

const LOAD_FAILED: &str = "Erro ao carregar comentários.";

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, res::notice("Fórum", "Tópico não encontrado.")).into_response()
}

/// The thread itself is read once; its comments come from their own
/// subscription.
pub(super) async fn render_thread(
    store: &dyn DocumentStore,
    thread_id: &str,
    profile: &ProfileState,
    form: &CommentForm,
    status: Option<&FormStatus>,
) -> AppResult<Response> {
    let thread = match store.get(&paths::forum_threads(), thread_id).await {
        Ok(Some(doc)) => Doc::<ForumThread>::decode(doc)?,
        Ok(None) | Err(StoreError::InvalidPath(_)) => return Ok(not_found()),
        Err(err) => return Err(err.into()),
    };
    let query = comments_query(thread_id)?;

    let comments = match live::first_snapshot::<ForumComment>(store, query).await {
        Ok(items) => render_comments(&items),
        Err(reason) => {
            tracing::warn!(%thread_id, %reason, "comments unavailable");
            res::status(Some(LOAD_FAILED), false)
        }
    };

    let composer = match profile {
        ProfileState::Loaded(_) => include_res!(str, "/pages/forum/new_comment.html")
            .replace("{id}", &res::escape(thread_id))
            .replace("{status}", &FormStatus::render(status))
            .replace("{text}", &res::escape(&form.text)),
        ProfileState::Missing => r#"<p class="status error">Você precisa <a href="/cadastro">cadastrar seu perfil</a> para comentar.</p>"#.to_owned(),
        ProfileState::NotReady => res::status(Some("Autenticação não está pronta. Recarregue a página."), false),
    };

    let image = match &thread.data.image_url {
        Some(url) => format!(r#"<span class="image main"><img src="{}" alt="" /></span>"#, res::escape(url)),
        None => String::new(),
    };

    let body = include_res!(str, "/pages/forum/thread.html")
        .replace("{id}", &res::escape(thread_id))
        .replace("{title}", &res::escape(&thread.data.title))
        .replace("{author}", &res::escape(thread.data.author_username.as_deref().unwrap_or("Anônimo")))
        .replace("{date}", &format_date(thread.data.created_at))
        .replace("{image}", &image)
        .replace("{body}", &res::markdown(&thread.data.main_comment))
        .replace("{composer}", &composer)
        .replace("{comments}", &comments);

    Ok(res::page(&thread.data.title, &body).into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn thread(
    Path(thread_id): Path<String>,
    State(store): State<Arc<dyn DocumentStore>>,
    session: Session,
) -> AppResult<Response> {
    let user_id = current_user(&session).await?;
    let profile = load_own_profile(store.as_ref(), user_id.as_deref()).await?;

    render_thread(store.as_ref(), &thread_id, &profile, &CommentForm::default(), None).await
}

#[debug_handler(state = AppState)]
pub(crate) async fn thread_ws(
    Path(thread_id): Path<String>,
    State(store): State<Arc<dyn DocumentStore>>,
    ws: WebSocketUpgrade,
) -> Response {
    let Ok(query) = comments_query(&thread_id) else {
        return not_found();
    };

    ws.on_upgrade(async move |socket| {
        live::pump_view::<ForumComment, _>(socket, store, query, |state, _| {
            live::render_state(state, LOAD_FAILED, render_comments)
        })
        .await
    })
}
