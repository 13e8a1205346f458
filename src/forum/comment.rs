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
    profiles::{ProfileState, load_own_profile},
    session::current_user,
    store::{DocumentStore, paths, server_timestamp},
};

use super::thread::render_thread;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct CommentForm {
    #[serde(default)]
    pub text: String,
}

/// Appends a reply to a thread.
pub async fn submit_comment(
    store: &dyn DocumentStore,
    user_id: Option<&str>,
    thread_id: &str,
    form: &CommentForm,
) -> Result<String, FormError> {
    let author_id = forms::actor(user_id)?;
    let ProfileState::Loaded(profile) = load_own_profile(store, Some(author_id)).await? else {
        return Err(FormError::ProfileRequired);
    };
    let text = forms::required(&form.text, "O comentário não pode estar vazio.")?;

    let id = store
        .add(
            &paths::comments(thread_id)?,
            json!({
                "text": text,
                "authorId": author_id,
                "authorUsername": profile.username,
                "createdAt": server_timestamp(),
            }),
        )
        .await?;
    tracing::info!(%id, %thread_id, %author_id, "comment posted");
    Ok(id)
}

#[debug_handler(state = AppState)]
pub(crate) async fn create_comment(
    Path(thread_id): Path<String>,
    State(store): State<Arc<dyn DocumentStore>>,
    session: Session,
    Form(form): Form<CommentForm>,
) -> AppResult<Response> {
    let user_id = current_user(&session).await?;

    let (form, status) = match submit_comment(store.as_ref(), user_id.as_deref(), &thread_id, &form).await {
        Ok(_) => (CommentForm::default(), FormStatus::success("Comentário publicado!")),
        Err(err) => {
            let status = FormStatus::failure(&err);
            (form, status)
        }
    };

    let profile = load_own_profile(store.as_ref(), user_id.as_deref()).await?;
    render_thread(store.as_ref(), &thread_id, &profile, &form, Some(&status)).await
}
