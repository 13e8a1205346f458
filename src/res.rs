use axum::{
    debug_handler,
    http::header,
    response::{Html, IntoResponse},
};
use pulldown_cmark::{Event, Options, Parser};

#[macro_export]
macro_rules! include_res {
    (bytes, $p:expr) => {
        include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/res", $p))
    };
    (str, $p:expr) => {
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/res", $p))
    };
}

/// Wraps a page body in the site layout.
pub fn page(title: &str, content: &str) -> Html<String> {
    Html(
        include_res!(str, "/pages/layout.html")
            .replace("{title}", &escape(title))
            .replace("{content}", content),
    )
}

pub fn notice(title: &str, message: &str) -> Html<String> {
    page(
        title,
        &include_res!(str, "/pages/notice.html")
            .replace("{title}", &escape(title))
            .replace("{message}", &escape(message)),
    )
}

/// Inline status line under a form; empty when there is nothing to say.
pub fn status(message: Option<&str>, ok: bool) -> String {
    match message {
        Some(message) => format!(
            r#"<p class="status {}">{}</p>"#,
            if ok { "ok" } else { "error" },
            escape(message)
        ),
        None => String::new(),
    }
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Markdown to HTML. Raw HTML in the source is shown as text.
pub fn markdown(text: &str) -> String {
    let parser = Parser::new_ext(text, Options::ENABLE_STRIKETHROUGH).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        _ => event,
    });

    let mut html_output = String::new();
    pulldown_cmark::html::push_html(&mut html_output, parser);
    html_output
}

/// Local link that opens `target` through the redirector.
pub fn redirect_href(target: &str) -> String {
    let Ok(mut url) = reqwest::Url::parse("http://localhost/redirect") else {
        return "#".to_owned();
    };
    url.query_pairs_mut().append_pair("to", target);
    format!("/redirect?{}", url.query().unwrap_or_default())
}

/// First `max` characters of `text`, with an ellipsis when cut.
pub fn excerpt(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_owned(),
    }
}

#[debug_handler]
pub async fn live_script() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/javascript")],
        include_res!(str, "/assets/live.js"),
    )
}
