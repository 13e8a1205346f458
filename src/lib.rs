pub mod auth;
pub mod chat;
pub mod config;
pub mod forms;
pub mod forum;
pub mod index;
pub mod live;
pub mod models;
pub mod news;
pub mod pages;
pub mod profiles;
pub mod res;
pub mod search;
pub mod session;
pub mod store;
pub mod sync;
pub mod telemetry;

use std::sync::Arc;

use axum::{
    Router,
    extract::FromRef,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
};
use serde_json::Value;
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer, cookie::SameSite};

use config::Config;
use store::DocumentStore;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub config: Arc<Config>,
    pub identity: auth::IdentityProvider,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, config: Config) -> Self {
        let identity = auth::IdentityProvider::from_config(&config);
        AppState { store, config: Arc::new(config), identity }
    }
}

/// The whole site: pages, live sockets, anonymous sessions.
pub fn app(state: AppState) -> Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(state.config.session_minutes)));

    Router::new()
        .merge(index::router())
        .merge(pages::router())
        .merge(news::router())
        .merge(profiles::router())
        .nest("/forum", forum::router())
        .nest("/chat", chat::router())
        .layer(middleware::from_fn_with_state(state.clone(), auth::ensure_identity))
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Served on every route when the store could not be reached at startup.
pub fn unavailable(reason: String) -> Router {
    Router::new().fallback(move || {
        let reason = reason.clone();
        async move { (StatusCode::SERVICE_UNAVAILABLE, pages::unavailable(&reason)) }
    })
}

pub trait GetField {
    fn get_str_field(&self, field: &str) -> AppResult<String>;
}

impl GetField for Value {
    fn get_str_field(&self, field: &str) -> AppResult<String> {
        Ok(
            self.get(field)
            .ok_or(format!("expected {field} in {self}"))?
            .as_str()
            .ok_or(format!("expected {field} in {self} to be string"))?
            .to_owned()
        )
    }
}

pub type AppResult<T> = Result<T, AppError>;
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(error = ?self.0, "request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            res::notice("Erro", &format!("Algo deu errado: {}", self.0)),
        )
            .into_response()
    }
}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        Self(anyhow::Error::msg(err))
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        Self(anyhow::Error::msg(err.to_owned()))
    }
}

macro_rules! apperr_impl {
    ($E:ty) => {
        impl From<$E> for AppError {
            fn from(err: $E) -> Self {
                Self(anyhow::Error::from(err))
            }
        }
    };
}

apperr_impl!(serde_json::Error);
apperr_impl!(store::StoreError);
apperr_impl!(tower_sessions::session::Error);
apperr_impl!(axum::Error);
apperr_impl!(reqwest::Error);
