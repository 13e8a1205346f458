use std::sync::Arc;

use axum::{
    Form, debug_handler,
    extract::{Path, State},
    response::Response,
};
use serde::Deserialize;
use serde_json::json;
use tower_sessions::Session;

use crate::{
    AppResult, AppState,
    forms::{self, FormError, FormStatus},
    models::room_id,
    profiles::{ProfileState, load_own_profile},
    session::current_user,
    store::{DocumentStore, paths, server_timestamp},
};

use super::room::{chat_user, load_peer, render_chat, unknown_peer};

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct MessageForm {
    #[serde(default)]
    pub text: String,
}

/// Sends `form.text` from `user_id` to `peer_id` and returns the message id.
pub async fn send_message(
    store: &dyn DocumentStore,
    user_id: Option<&str>,
    peer_id: &str,
    form: &MessageForm,
) -> Result<String, FormError> {
    let sender_id = forms::actor(user_id)?;
    let ProfileState::Loaded(profile) = load_own_profile(store, Some(sender_id)).await? else {
        return Err(FormError::ProfileRequired);
    };
    let text = forms::required(&form.text, "A mensagem não pode estar vazia.")?;

    let room = room_id(sender_id, peer_id);
    let id = store
        .add(
            &paths::chat_messages(&room)?,
            json!({
                "text": text,
                "senderId": sender_id,
                "senderUsername": profile.username,
                "timestamp": server_timestamp(),
            }),
        )
        .await?;
    tracing::debug!(%id, %room, "message sent");
    Ok(id)
}

#[debug_handler(state = AppState)]
pub(crate) async fn post_message(
    Path(peer_id): Path<String>,
    State(store): State<Arc<dyn DocumentStore>>,
    session: Session,
    Form(form): Form<MessageForm>,
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

    let (form, status) = match send_message(store.as_ref(), Some(&user_id), &peer_id, &form).await {
        Ok(_) => (MessageForm::default(), None),
        Err(err) => {
            let status = FormStatus::failure(&err);
            (form, Some(status))
        }
    };

    render_chat(store.as_ref(), &user_id, Some(&peer), &form, status.as_ref()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        chat::messages_query,
        live::first_snapshot,
        models::ChatMessage,
        store::{InMemoryStore, SetOptions},
    };

    async fn register(store: &InMemoryStore, id: &str, name: &str) {
        store
            .set(&paths::profiles(), id, json!({ "username": name, "userId": id }), SetOptions::merge())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn both_participants_see_the_message() {
        let store = InMemoryStore::new();
        register(&store, "ana", "Ana").await;
        register(&store, "bia", "Bia").await;

        send_message(&store, Some("bia"), "ana", &MessageForm { text: "Oi, Ana".into() }).await.unwrap();
        send_message(&store, Some("ana"), "bia", &MessageForm { text: "Olá!".into() }).await.unwrap();

        let seen_by_ana = first_snapshot::<ChatMessage>(&store, messages_query("ana", "bia").unwrap()).await.unwrap();
        let seen_by_bia = first_snapshot::<ChatMessage>(&store, messages_query("bia", "ana").unwrap()).await.unwrap();
        assert_eq!(seen_by_ana, seen_by_bia);

        let texts: Vec<_> = seen_by_ana.iter().map(|m| m.data.text.as_str()).collect();
        assert_eq!(texts, ["Oi, Ana", "Olá!"]);
        assert_eq!(seen_by_ana[0].data.sender_username.as_deref(), Some("Bia"));
    }

    #[tokio::test]
    async fn blank_messages_are_not_sent() {
        let store = InMemoryStore::new();
        register(&store, "ana", "Ana").await;

        let blank = MessageForm { text: "  ".into() };
        assert!(matches!(send_message(&store, Some("ana"), "bia", &blank).await, Err(FormError::Invalid(_))));
        assert!(matches!(send_message(&store, Some("zé"), "bia", &blank).await, Err(FormError::ProfileRequired)));
    }
}
