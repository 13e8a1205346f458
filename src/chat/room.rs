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
    models::{ChatMessage, Profile},
    profiles::{ProfileState, load_own_profile},
    res,
    session::current_user,
    store::{DocumentStore, StoreError, paths},
    sync::Doc,
};

use super::{MessageForm, messages_query, others_query, render_messages, render_users};

const USERS_FAILED: &str = "Erro ao carregar usuários.";
const MESSAGES_FAILED: &str = "Erro ao carregar mensagens.";

const NOT_READY: &str = "Autenticação não está pronta. Recarregue a página.";

/// The signed-in user, as long as they already have a profile.
pub(super) fn chat_user(user_id: Option<String>, profile: &ProfileState) -> Result<String, Response> {
    match (user_id, profile) {
        (Some(user_id), ProfileState::Loaded(_)) => Ok(user_id),
        (Some(_), ProfileState::Missing) => Err(res::page(
            "Chat Privado",
            r#"<section><header class="major"><h1>Chat Privado</h1></header><p class="status error">Você precisa <a href="/cadastro">cadastrar seu perfil</a> (Nome de Usuário e Perfil Profissional) antes de usar o chat.</p></section>"#,
        )
        .into_response()),
        _ => Err(res::notice("Chat Privado", NOT_READY).into_response()),
    }
}

/// Renders the chat page, with a conversation open when `peer` is given.
pub(super) async fn render_chat(
    store: &dyn DocumentStore,
    user_id: &str,
    peer: Option<&Profile>,
    form: &MessageForm,
    status: Option<&FormStatus>,
) -> AppResult<Response> {
    let selected = peer.map(|p| p.user_id.as_str());
    let users = match live::first_snapshot::<Profile>(store, others_query(user_id)).await {
        Ok(items) => render_users(&items, selected),
        Err(reason) => {
            tracing::warn!(%reason, "user list unavailable");
            res::status(Some(USERS_FAILED), false)
        }
    };

    let conversation = match peer {
        None => r#"<p class="placeholder">Selecione um usuário à esquerda para iniciar a conversa.</p>"#.to_owned(),
        Some(peer) => {
            let messages = match live::first_snapshot::<ChatMessage>(store, messages_query(user_id, &peer.user_id)?).await {
                Ok(items) => render_messages(&items, user_id),
                Err(reason) => {
                    tracing::warn!(%reason, "messages unavailable");
                    res::status(Some(MESSAGES_FAILED), false)
                }
            };
            include_res!(str, "/pages/chat/conversation.html")
                .replace("{peer_id}", &res::escape(&peer.user_id))
                .replace("{peer_name}", &res::escape(&peer.username))
                .replace("{messages}", &messages)
                .replace("{status}", &FormStatus::render(status))
                .replace("{text}", &res::escape(&form.text))
        }
    };

    let body = include_res!(str, "/pages/chat/chat.html")
        .replace("{selected}", &res::escape(selected.unwrap_or_default()))
        .replace("{users}", &users)
        .replace("{conversation}", &conversation);

    Ok(res::page("Chat Privado", &body).into_response())
}

/// Profile of the user on the other end, if they exist.
pub(super) async fn load_peer(store: &dyn DocumentStore, peer_id: &str) -> AppResult<Option<Profile>> {
    match store.get(&paths::profiles(), peer_id).await {
        Ok(Some(doc)) => Ok(Some(Doc::<Profile>::decode(doc)?.data)),
        Ok(None) | Err(StoreError::InvalidPath(_)) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

pub(super) fn unknown_peer() -> Response {
    (StatusCode::NOT_FOUND, res::notice("Chat Privado", "Usuário não encontrado.")).into_response()
}

#[debug_handler(state = AppState)]
pub(crate) async fn chat(
    State(store): State<Arc<dyn DocumentStore>>,
    session: Session,
) -> AppResult<Response> {
    let user_id = current_user(&session).await?;
    let profile = load_own_profile(store.as_ref(), user_id.as_deref()).await?;
    let user_id = match chat_user(user_id, &profile) {
        Ok(user_id) => user_id,
        Err(response) => return Ok(response),
    };

    render_chat(store.as_ref(), &user_id, None, &MessageForm::default(), None).await
}

#[debug_handler(state = AppState)]
pub(crate) async fn room(
    Path(peer_id): Path<String>,
    State(store): State<Arc<dyn DocumentStore>>,
    session: Session,
) -> AppResult<Response> {
    let user_id = current_user(&session).await?;
    let profile = load_own_profile(store.as_ref(), user_id.as_deref()).await?;
    let user_id = match chat_user(user_id, &profile) {
        Ok(user_id) => user_id,
        Err(response) => return Ok(response),
    };
    let Some(peer) = load_peer(store.as_ref(), &peer_id).await? else {
        return Ok(unknown_peer());
    };

    render_chat(store.as_ref(), &user_id, Some(&peer), &MessageForm::default(), None).await
}

#[debug_handler(state = AppState)]
pub(crate) async fn users_ws(
    State(store): State<Arc<dyn DocumentStore>>,
    session: Session,
    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let Some(user_id) = current_user(&session).await? else {
        return Ok(StatusCode::UNAUTHORIZED.into_response());
    };
    let query = others_query(&user_id);

    Ok(ws.on_upgrade(async move |socket| {
        live::pump_view::<Profile, _>(socket, store, query, |state, selected| {
            let selected = Some(selected).filter(|s| !s.is_empty());
            live::render_state(state, USERS_FAILED, |items| render_users(items, selected))
        })
        .await
    }))
}

/// Live conversation. Switching peers means a new socket, and so a new
/// subscription; the old one goes away with its socket.
#[debug_handler(state = AppState)]
pub(crate) async fn room_ws(
    Path(peer_id): Path<String>,
    State(store): State<Arc<dyn DocumentStore>>,
    session: Session,
    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let user_id = current_user(&session).await?;
    let profile = load_own_profile(store.as_ref(), user_id.as_deref()).await?;
    let user_id = match chat_user(user_id, &profile) {
        Ok(user_id) => user_id,
        Err(response) => return Ok(response),
    };
    if load_peer(store.as_ref(), &peer_id).await?.is_none() {
        return Ok(unknown_peer());
    }
    let query = messages_query(&user_id, &peer_id)?;

    Ok(ws.on_upgrade(async move |socket| {
        live::pump_view::<ChatMessage, _>(socket, store, query, move |state, _| {
            live::render_state(state, MESSAGES_FAILED, |items| render_messages(items, &user_id))
        })
        .await
    }))
}
