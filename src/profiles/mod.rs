mod register;

use axum::{Router, routing::get};

use crate::{
    AppState,
    models::Profile,
    store::{DocumentStore, StoreResult, paths},
    sync::Doc,
};

pub use register::{ProfileForm, save_profile};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/cadastro", get(register::register_page).post(register::register))
}

/// The visitor's own profile, fetched once per page on its own. Pages never
/// guess it from a list of profiles.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileState {
    /// No identity yet.
    NotReady,
    /// Signed in but never registered.
    Missing,
    Loaded(Profile),
}

impl ProfileState {
    pub fn profile(&self) -> Option<&Profile> {
        match self {
            ProfileState::Loaded(profile) => Some(profile),
            _ => None,
        }
    }
}

pub async fn load_own_profile(store: &dyn DocumentStore, user_id: Option<&str>) -> StoreResult<ProfileState> {
    let Some(user_id) = user_id else {
        return Ok(ProfileState::NotReady);
    };

    match store.get(&paths::profiles(), user_id).await? {
        Some(doc) => match Doc::<Profile>::decode(doc) {
            Ok(doc) => Ok(ProfileState::Loaded(doc.data)),
            Err(err) => {
                tracing::warn!(%user_id, error = %err, "stored profile is malformed");
                Ok(ProfileState::Missing)
            }
        },
        None => Ok(ProfileState::Missing),
    }
}
