use std::sync::Arc;

use axum::{
    Json, Router, debug_handler,
    extract::{Query, State},
    response::Html,
    routing::get,
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{AppState, include_res, res, store::DocumentStore};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/consultoria", get(|| async { res::page("Consultoria", include_res!(str, "/pages/static/consultoria.html")) }))
        .route("/contato", get(|| async { res::page("Contato", include_res!(str, "/pages/static/contato.html")) }))
        .route("/cursos", get(|| async { res::page("Cursos", include_res!(str, "/pages/static/cursos.html")) }))
        .route("/sobre", get(|| async { res::page("Sobre Nós", include_res!(str, "/pages/static/sobre.html")) }))
        .route("/redirect", get(redirect))
        .route("/health", get(health))
}

#[derive(Deserialize)]
pub(crate) struct RedirectQuery {
    to: Option<String>,
}

/// Only absolute http(s) links leave the site.
pub fn external_target(to: Option<&str>) -> Option<reqwest::Url> {
    let to = to?.trim();
    if to.is_empty() || to == "#" {
        return None;
    }
    reqwest::Url::parse(to)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"))
}

/// Opens the target in a new tab and sends the visitor back where they came
/// from. Without a usable target it only goes back.
#[debug_handler]
pub(crate) async fn redirect(Query(RedirectQuery { to }): Query<RedirectQuery>) -> Html<String> {
    let open = match external_target(to.as_deref()) {
        Some(url) => {
            tracing::debug!(%url, "redirecting");
            let target = serde_json::to_string(url.as_str())
                .unwrap_or_else(|_| "\"\"".to_owned())
                .replace('<', "\\u003c");
            format!("window.open({target}, '_blank', 'noopener,noreferrer');")
        }
        None => {
            tracing::warn!(to = ?to, "invalid or missing redirect target");
            String::new()
        }
    };

    res::page(
        "Redirecionando...",
        &include_res!(str, "/pages/redirect.html").replace("{open}", &open),
    )
}

#[debug_handler(state = AppState)]
pub(crate) async fn health(State(store): State<Arc<dyn DocumentStore>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "listeners": store.listener_count(),
    }))
}

/// The page every route shows when the platform could not start.
pub fn unavailable(reason: &str) -> Html<String> {
    res::page(
        "Plataforma indisponível",
        &include_res!(str, "/pages/unavailable.html").replace("{reason}", &res::escape(reason)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_web_links_are_followed() {
        assert!(external_target(Some("https://valor.globo.com/mercados")).is_some());
        assert!(external_target(Some(" http://exame.com ")).is_some());
        assert!(external_target(Some("#")).is_none());
        assert!(external_target(Some("")).is_none());
        assert!(external_target(Some("javascript:alert(1)")).is_none());
        assert!(external_target(Some("/news")).is_none());
        assert!(external_target(None).is_none());
    }

    #[tokio::test]
    async fn redirect_page_quotes_the_target() {
        let Html(page) = redirect(Query(RedirectQuery {
            to: Some("https://example.com/?q=</script><script>".into()),
        }))
        .await;
        assert!(page.contains("noopener,noreferrer"));
        assert!(!page.contains("</script><script>"));
        assert!(page.contains("history.back()"));
    }

    #[tokio::test]
    async fn bad_targets_only_go_back() {
        let Html(page) = redirect(Query(RedirectQuery { to: Some("#".into()) })).await;
        assert!(!page.contains("window.open"));
        assert!(page.contains("history.back()"));
    }
}
