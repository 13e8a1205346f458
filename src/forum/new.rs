use std::sync::Arc;

use axum::{
    Form, debug_handler,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use serde_json::json;
use tower_sessions::Session;

use crate::{
    AppResult, AppState,
    forms::{self, FormError, FormStatus},
    profiles::{ProfileState, load_own_profile},
    session::current_user,
    store::{DocumentStore, paths, server_timestamp},
};

use super::list::render_forum;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ThreadForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub main_comment: String,
    #[serde(default)]
    pub image_url: String,
}

/// Opens a thread signed with the author's current username. Returns the
/// new thread's id.
pub async fn submit_thread(
    store: &dyn DocumentStore,
    user_id: Option<&str>,
    form: &ThreadForm,
) -> Result<String, FormError> {
    let author_id = forms::actor(user_id)?;
    let ProfileState::Loaded(profile) = load_own_profile(store, Some(author_id)).await? else {
        return Err(FormError::ProfileRequired);
    };
    let title = forms::required(&form.title, "Título e Comentário são obrigatórios.")?;
    let main_comment = forms::required(&form.main_comment, "Título e Comentário são obrigatórios.")?;

    let id = store
        .add(
            &paths::forum_threads(),
            json!({
                "title": title,
                "mainComment": main_comment,
                "imageUrl": forms::optional(&form.image_url),
                "authorId": author_id,
                "authorUsername": profile.username,
                "createdAt": server_timestamp(),
            }),
        )
        .await?;
    tracing::info!(%id, %author_id, "thread created");
    Ok(id)
}

#[debug_handler(state = AppState)]
pub(crate) async fn create_thread(
    State(store): State<Arc<dyn DocumentStore>>,
    session: Session,
    Form(form): Form<ThreadForm>,
) -> AppResult<Response> {
    let user_id = current_user(&session).await?;

    match submit_thread(store.as_ref(), user_id.as_deref(), &form).await {
        Ok(id) => Ok(Redirect::to(&format!("/forum/{id}")).into_response()),
        Err(err) => {
            let status = FormStatus::failure(&err);
            let profile = load_own_profile(store.as_ref(), user_id.as_deref()).await?;
            Ok(render_forum(store.as_ref(), &profile, "", &form, Some(&status)).await)
        }
    }
}
