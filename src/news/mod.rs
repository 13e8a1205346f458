mod admin;
mod list;

use axum::{Router, routing::get};

use crate::{
    AppState, include_res,
    models::Article,
    res,
    store::{Direction, Query, StoreResult, paths},
    sync::Doc,
};

pub use admin::{ArticleForm, submit_article};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/news", get(list::news))
        .route("/news/ws", get(list::news_ws))
        .route("/admin/news", get(admin::article_page).post(admin::create_article))
}

/// Articles of a tenant, newest first.
pub fn latest_articles(app_id: &str, limit: Option<usize>) -> StoreResult<Query> {
    let query = Query::new(paths::articles(app_id)?).order_by("createdAt", Direction::Descending);
    Ok(match limit {
        Some(limit) => query.limit(limit),
        None => query,
    })
}

pub(crate) fn render_articles(items: &[Doc<Article>]) -> String {
    if items.is_empty() {
        return r#"<p class="empty">Nenhum artigo publicado ainda.</p>"#.to_owned();
    }

    items
        .iter()
        .map(|Doc { id, data: article }| {
            let (open, close) = match article.external_link() {
                Some(link) => (
                    format!(r#"<a href="{}">"#, res::escape(&res::redirect_href(link))),
                    "</a>",
                ),
                None => ("<span>".to_owned(), "</span>"),
            };
            include_res!(str, "/pages/article_item.html")
                .replace("{id}", &res::escape(id))
                .replace("{open}", &open)
                .replace("{close}", close)
                .replace("{image}", &res::escape(&article.image))
                .replace("{category}", &res::escape(&article.category))
                .replace("{title}", &res::escape(&article.title))
                .replace("{summary}", &res::escape(&article.summary))
        })
        .collect()
}
