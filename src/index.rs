use std::sync::Arc;

use axum::{
    Router, debug_handler,
    extract::State,
    response::{IntoResponse, Response},
    routing::get,
};

use crate::{
    AppResult, AppState, include_res,
    config::Config,
    live,
    models::Article,
    news::{latest_articles, render_articles},
    res,
    store::DocumentStore,
};

const HOME_ARTICLES: usize = 3;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/assets/live.js", get(res::live_script))
}

#[debug_handler(state = AppState)]
pub async fn index(
    State(store): State<Arc<dyn DocumentStore>>,
    State(config): State<Arc<Config>>,
) -> AppResult<Response> {
    let query = latest_articles(&config.app_id, Some(HOME_ARTICLES))?;
    let articles = match live::first_snapshot::<Article>(store.as_ref(), query).await {
        Ok(items) => render_articles(&items),
        Err(reason) => {
            tracing::warn!(%reason, "home articles unavailable");
            String::new()
        }
    };

    Ok(res::page(
        "Praxis Capital",
        &include_res!(str, "/pages/home.html")
            .replace("{limit}", &HOME_ARTICLES.to_string())
            .replace("{articles}", &articles),
    )
    .into_response())
}
