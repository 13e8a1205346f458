use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{Query, State, WebSocketUpgrade},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::{
    AppResult, AppState, include_res,
    config::Config,
    live,
    models::Article,
    res,
    store::DocumentStore,
};

use super::{latest_articles, render_articles};

const LOAD_FAILED: &str = "Erro ao carregar o acervo de notícias. Verifique a conexão.";

#[derive(Deserialize)]
pub(crate) struct NewsQuery {
    limit: Option<usize>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn news(
    State(store): State<Arc<dyn DocumentStore>>,
    State(config): State<Arc<Config>>,
) -> AppResult<Response> {
    let articles = match live::first_snapshot::<Article>(store.as_ref(), latest_articles(&config.app_id, None)?).await {
        Ok(items) => render_articles(&items),
        Err(reason) => {
            tracing::warn!(%reason, "news list unavailable");
            res::status(Some(LOAD_FAILED), false)
        }
    };

    Ok(res::page(
        "Notícias e Artigos",
        &include_res!(str, "/pages/news.html").replace("{articles}", &articles),
    )
    .into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn news_ws(
    Query(NewsQuery { limit }): Query<NewsQuery>,
    State(store): State<Arc<dyn DocumentStore>>,
    State(config): State<Arc<Config>>,
    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let query = latest_articles(&config.app_id, limit)?;

    Ok(ws
        .on_upgrade(async move |socket| {
            live::pump_view::<Article, _>(socket, store, query, |state, _| {
                live::render_state(state, LOAD_FAILED, render_articles)
            })
            .await
        })
        .into_response())
}
