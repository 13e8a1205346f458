use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{Query, State, WebSocketUpgrade},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::{
    AppResult, AppState, include_res, live,
    forms::FormStatus,
    models::ForumThread,
    profiles::{ProfileState, load_own_profile},
    res,
    search::{SearchMemo, filter_threads},
    session::current_user,
    store::DocumentStore,
    sync::SyncState,
};

use super::{ThreadForm, render_threads, threads_query};

const LOAD_FAILED: &str = "Não foi possível carregar os tópicos.";

#[derive(Deserialize)]
pub(crate) struct SearchQuery {
    #[serde(default)]
    q: String,
}

/// The create-thread box: the form itself, or why it is not offered.
fn render_composer(profile: &ProfileState, form: &ThreadForm, status: Option<&FormStatus>) -> String {
    match profile {
        ProfileState::Loaded(_) => include_res!(str, "/pages/forum/new_thread.html")
            .replace("{status}", &FormStatus::render(status))
            .replace("{title}", &res::escape(&form.title))
            .replace("{main_comment}", &res::escape(&form.main_comment))
            .replace("{image_url}", &res::escape(&form.image_url)),
        ProfileState::Missing => r#"<p class="status error">Você precisa <a href="/cadastro">cadastrar seu perfil</a> para poder criar tópicos.</p>"#.to_owned(),
        ProfileState::NotReady => res::status(Some("Autenticação não está pronta. Recarregue a página."), false),
    }
}

pub(super) async fn render_forum(
    store: &dyn DocumentStore,
    profile: &ProfileState,
    needle: &str,
    form: &ThreadForm,
    status: Option<&FormStatus>,
) -> Response {
    let threads = match live::first_snapshot::<ForumThread>(store, threads_query()).await {
        Ok(items) => render_threads(&filter_threads(&items, needle)),
        Err(reason) => {
            tracing::warn!(%reason, "thread list unavailable");
            res::status(Some(LOAD_FAILED), false)
        }
    };

    let body = include_res!(str, "/pages/forum/forum.html")
        .replace("{composer}", &render_composer(profile, form, status))
        .replace("{q}", &res::escape(needle))
        .replace("{threads}", &threads);

    res::page("Fórum de Discussão", &body).into_response()
}

#[debug_handler(state = AppState)]
pub(crate) async fn forum(
    Query(SearchQuery { q }): Query<SearchQuery>,
    State(store): State<Arc<dyn DocumentStore>>,
    session: Session,
) -> AppResult<Response> {
    let user_id = current_user(&session).await?;
    let profile = load_own_profile(store.as_ref(), user_id.as_deref()).await?;

    Ok(render_forum(store.as_ref(), &profile, &q, &ThreadForm::default(), None).await)
}

/// Live thread list. Text frames from the page are the search box contents.
#[debug_handler(state = AppState)]
pub(crate) async fn forum_ws(
    State(store): State<Arc<dyn DocumentStore>>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(async move |socket| {
        let mut memo = SearchMemo::default();
        live::pump_view::<ForumThread, _>(socket, store, threads_query(), move |state, needle| match state {
            SyncState::Synced(snapshot) => render_threads(&memo.project(snapshot, needle)),
            other => live::render_state(other, LOAD_FAILED, render_threads),
        })
        .await
    })
}
