use std::sync::Arc;

use axum::{
    Form, debug_handler,
    extract::State,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use tower_sessions::Session;

use crate::{
    AppResult, AppState,
    forms::{self, FormError, FormStatus},
    include_res,
    models::PROFESSIONAL_PROFILES,
    res,
    session::current_user,
    store::{DocumentStore, SetOptions, paths, server_timestamp},
};

use super::{ProfileState, load_own_profile};

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ProfileForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub profile: String,
}

/// Creates or updates the visitor's profile. Fields left out of the write
/// keep their stored values.
pub async fn save_profile(
    store: &dyn DocumentStore,
    user_id: Option<&str>,
    form: &ProfileForm,
) -> Result<(), FormError> {
    let user_id = forms::actor(user_id)?;
    let username = forms::required(&form.username, "Nome de Usuário e Perfil são obrigatórios.")?;
    let profile = forms::required(&form.profile, "Nome de Usuário e Perfil são obrigatórios.")?;
    if !PROFESSIONAL_PROFILES.contains(&profile) {
        return Err(FormError::Invalid("Selecione um perfil profissional da lista."));
    }

    store
        .set(
            &paths::profiles(),
            user_id,
            json!({
                "username": username,
                "profile": profile,
                "lastUpdated": server_timestamp(),
                "userId": user_id,
            }),
            SetOptions::merge(),
        )
        .await?;
    tracing::info!(%user_id, %username, "profile saved");
    Ok(())
}

fn profile_options(selected: &str) -> String {
    PROFESSIONAL_PROFILES
        .iter()
        .map(|label| {
            format!(
                r#"<option value="{0}"{1}>{0}</option>"#,
                res::escape(label),
                if *label == selected.trim() { " selected" } else { "" }
            )
        })
        .collect()
}

fn render(user_id: Option<&str>, existing: bool, form: &ProfileForm, status: Option<&FormStatus>) -> Response {
    let (heading, submit) = if existing {
        ("Editar Perfil", "Atualizar Perfil")
    } else {
        ("Cadastro de Perfil", "Cadastrar Perfil")
    };

    let body = include_res!(str, "/pages/register.html")
        .replace("{heading}", heading)
        .replace("{user_id}", &res::escape(user_id.unwrap_or("Carregando...")))
        .replace("{status}", &FormStatus::render(status))
        .replace("{username}", &res::escape(&form.username))
        .replace("{options}", &profile_options(&form.profile))
        .replace("{submit}", submit);

    res::page(heading, &body).into_response()
}

#[debug_handler(state = AppState)]
pub(crate) async fn register_page(
    State(store): State<Arc<dyn DocumentStore>>,
    session: Session,
) -> AppResult<Response> {
    let user_id = current_user(&session).await?;

    let profile = load_own_profile(store.as_ref(), user_id.as_deref()).await.unwrap_or_else(|err| {
        tracing::warn!(error = %err, "could not load profile");
        ProfileState::Missing
    });

    Ok(match profile {
        ProfileState::Loaded(profile) => render(
            user_id.as_deref(),
            true,
            &ProfileForm { username: profile.username, profile: profile.profile },
            Some(&FormStatus::success("Seu perfil atual foi carregado.")),
        ),
        ProfileState::NotReady => render(
            None,
            false,
            &ProfileForm::default(),
            Some(&FormStatus::failure(&FormError::AuthNotReady)),
        ),
        ProfileState::Missing => render(user_id.as_deref(), false, &ProfileForm::default(), None),
    })
}

#[debug_handler(state = AppState)]
pub(crate) async fn register(
    State(store): State<Arc<dyn DocumentStore>>,
    session: Session,
    Form(form): Form<ProfileForm>,
) -> AppResult<Response> {
    let user_id = current_user(&session).await?;

    Ok(match save_profile(store.as_ref(), user_id.as_deref(), &form).await {
        Ok(()) => render(user_id.as_deref(), true, &form, Some(&FormStatus::success("Perfil salvo com sucesso!"))),
        Err(err) => {
            let existing = load_own_profile(store.as_ref(), user_id.as_deref())
                .await
                .is_ok_and(|state| state.profile().is_some());
            render(user_id.as_deref(), existing, &form, Some(&FormStatus::failure(&err)))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::Profile, store::InMemoryStore, sync::Doc};

    async fn stored(store: &InMemoryStore, user_id: &str) -> Profile {
        let doc = store.get(&paths::profiles(), user_id).await.unwrap().unwrap();
        Doc::<Profile>::decode(doc).unwrap().data
    }

    #[tokio::test]
    async fn profiles_are_keyed_by_identity() {
        let store = InMemoryStore::new();
        let form = ProfileForm { username: " Ana ".into(), profile: "Consultor Financeiro".into() };
        save_profile(&store, Some("u1"), &form).await.unwrap();
        save_profile(&store, Some("u1"), &ProfileForm { username: "Ana Paula".into(), ..form }).await.unwrap();

        let profile = stored(&store, "u1").await;
        assert_eq!(profile.username, "Ana Paula");
        assert_eq!(profile.profile, "Consultor Financeiro");
        assert_eq!(profile.user_id, "u1");
        assert!(profile.last_updated.is_some());
    }

    #[tokio::test]
    async fn both_fields_are_required() {
        let store = InMemoryStore::new();
        let form = ProfileForm { username: "Ana".into(), profile: " ".into() };
        assert!(matches!(save_profile(&store, Some("u1"), &form).await, Err(FormError::Invalid(_))));
        assert!(store.get(&paths::profiles(), "u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn only_listed_professional_profiles_are_accepted() {
        let store = InMemoryStore::new();
        let form = ProfileForm { username: "Ana".into(), profile: "Astronauta".into() };
        assert!(matches!(save_profile(&store, Some("u1"), &form).await, Err(FormError::Invalid(_))));
        assert!(store.get(&paths::profiles(), "u1").await.unwrap().is_none());

        for label in PROFESSIONAL_PROFILES {
            let form = ProfileForm { username: "Ana".into(), profile: label.into() };
            save_profile(&store, Some("u1"), &form).await.unwrap();
            assert_eq!(stored(&store, "u1").await.profile, label);
        }
    }

    #[test]
    fn options_mark_the_current_profile() {
        let html = profile_options("Outro");
        assert_eq!(html.matches("<option").count(), PROFESSIONAL_PROFILES.len());
        assert!(html.contains(r#"<option value="Outro" selected>Outro</option>"#));
        assert!(html.contains(r#"<option value="Investidor Iniciante">Investidor Iniciante</option>"#));
    }
}
