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
    config::Config,
    forms::{self, FormError, FormStatus},
    include_res,
    models::{DEFAULT_CATEGORY, PLACEHOLDER_IMAGE, PLACEHOLDER_LINK},
    res,
    session::current_user,
    store::{DocumentStore, paths, server_timestamp},
};

const MIN_LINK_LEN: usize = 10;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ArticleForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub original_link: String,
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_owned()
}

impl Default for ArticleForm {
    fn default() -> Self {
        ArticleForm {
            title: String::new(),
            summary: String::new(),
            category: default_category(),
            image: String::new(),
            content: String::new(),
            original_link: String::new(),
        }
    }
}

impl ArticleForm {
    fn document(&self, author_id: &str) -> Result<serde_json::Value, FormError> {
        let title = forms::required(&self.title, "O título é obrigatório.")?;
        let summary = forms::required(&self.summary, "O resumo é obrigatório.")?;
        let content = forms::required(&self.content, "O conteúdo é obrigatório.")?;
        let original_link = forms::optional(&self.original_link);
        if original_link.is_some_and(|link| link.chars().count() < MIN_LINK_LEN) {
            return Err(FormError::Invalid(
                "O link original deve ser uma URL completa e válida (ex: https://...).",
            ));
        }

        Ok(json!({
            "title": title,
            "summary": summary,
            "category": forms::optional(&self.category).unwrap_or(DEFAULT_CATEGORY),
            "image": forms::optional(&self.image).unwrap_or(PLACEHOLDER_IMAGE),
            "content": content,
            "authorId": author_id,
            "createdAt": server_timestamp(),
            "link": PLACEHOLDER_LINK,
            "originalLink": original_link,
        }))
    }
}

/// Publishes one article under the tenant's collection.
pub async fn submit_article(
    store: &dyn DocumentStore,
    app_id: &str,
    user_id: Option<&str>,
    form: &ArticleForm,
) -> Result<String, FormError> {
    let author_id = forms::actor(user_id)?;
    let document = form.document(author_id)?;
    let id = store.add(&paths::articles(app_id)?, document).await?;
    tracing::info!(%id, %author_id, "article published");
    Ok(id)
}

fn render(form: &ArticleForm, status: Option<&FormStatus>) -> Response {
    let body = include_res!(str, "/pages/admin_news.html")
        .replace("{status}", &FormStatus::render(status))
        .replace("{title}", &res::escape(&form.title))
        .replace("{summary}", &res::escape(&form.summary))
        .replace("{category}", &res::escape(&form.category))
        .replace("{image}", &res::escape(&form.image))
        .replace("{content}", &res::escape(&form.content))
        .replace("{original_link}", &res::escape(&form.original_link));

    res::page("Cadastrar Artigo", &body).into_response()
}

#[debug_handler]
pub(crate) async fn article_page() -> Response {
    render(&ArticleForm::default(), None)
}

#[debug_handler(state = AppState)]
pub(crate) async fn create_article(
    State(store): State<Arc<dyn DocumentStore>>,
    State(config): State<Arc<Config>>,
    session: Session,
    Form(form): Form<ArticleForm>,
) -> AppResult<Response> {
    let user_id = current_user(&session).await?;

    Ok(match submit_article(store.as_ref(), &config.app_id, user_id.as_deref(), &form).await {
        Ok(_) => render(&ArticleForm::default(), Some(&FormStatus::success("Artigo cadastrado com sucesso!"))),
        Err(err) => render(&form, Some(&FormStatus::failure(&err))),
    })
}
