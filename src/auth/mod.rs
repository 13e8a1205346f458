//! Anonymous identity.
//!
//! Every visitor gets an opaque user id on first contact, kept in the
//! session. If sign-in fails the request still goes through; pages then
//! render their "authentication not ready" state.

mod firebase;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use rand::{Rng, distr::Alphanumeric};
use tower_sessions::Session;

use crate::{AppResult, config::Config, session::USER_ID};

const LOCAL_UID_LEN: usize = 28;

#[derive(Clone)]
pub enum IdentityProvider {
    /// Hosted identity service, anonymous sign-up over REST.
    Firebase {
        signup_url: String,
        http_client: reqwest::Client,
    },
    /// Ids minted in-process.
    Local,
}

impl IdentityProvider {
    pub fn from_config(config: &Config) -> Self {
        match &config.firebase {
            Some(firebase) => IdentityProvider::Firebase {
                signup_url: firebase::signup_url(&firebase.api_key),
                http_client: reqwest::Client::new(),
            },
            None => IdentityProvider::Local,
        }
    }

    pub async fn sign_in_anonymously(&self) -> AppResult<String> {
        match self {
            IdentityProvider::Firebase { signup_url, http_client } => {
                firebase::sign_up_anonymous(http_client, signup_url).await
            }
            IdentityProvider::Local => Ok(local_uid()),
        }
    }
}

fn local_uid() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(LOCAL_UID_LEN)
        .map(char::from)
        .collect()
}

/// Makes sure the session carries a user id before the handler runs.
pub async fn ensure_identity(
    State(identity): State<IdentityProvider>,
    session: Session,
    request: Request,
    next: Next,
) -> Response {
    match session.get::<String>(USER_ID).await {
        Ok(Some(_)) => {}
        Ok(None) => match identity.sign_in_anonymously().await {
            Ok(user_id) => match session.insert(USER_ID, &user_id).await {
                Ok(()) => tracing::info!(%user_id, "anonymous session started"),
                Err(err) => tracing::warn!(error = %err, "could not store user id in session"),
            },
            Err(err) => tracing::warn!(error = %err.0, "anonymous sign-in failed"),
        },
        Err(err) => tracing::warn!(error = %err, "session unreadable"),
    }

    next.run(request).await
}
