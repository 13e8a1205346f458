//! Documents of the site, as stored.
//!
//! Field names are camelCase on the wire. Author names on threads, comments
//! and chat messages are copied from the profile when written and are not
//! updated afterwards.

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, macros::format_description};

pub const DEFAULT_CATEGORY: &str = "Geral";
pub const PLACEHOLDER_IMAGE: &str = "assets/images/pic01.jpg";
pub const PLACEHOLDER_LINK: &str = "#";

fn default_category() -> String {
    DEFAULT_CATEGORY.to_owned()
}

fn default_image() -> String {
    PLACEHOLDER_IMAGE.to_owned()
}

fn default_link() -> String {
    PLACEHOLDER_LINK.to_owned()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "default_image")]
    pub image: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub author_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default = "default_link")]
    pub link: String,
    #[serde(default)]
    pub original_link: Option<String>,
}

impl Article {
    /// Where a click on the article should lead, if anywhere.
    pub fn external_link(&self) -> Option<&str> {
        [self.original_link.as_deref(), Some(self.link.as_str())]
            .into_iter()
            .flatten()
            .find(|link| is_valid_link(link))
    }
}

/// The professional labels a profile can carry.
pub const PROFESSIONAL_PROFILES: [&str; 5] = [
    "Investidor Iniciante",
    "Investidor Experiente",
    "Consultor Financeiro",
    "Estudante de Finanças",
    "Outro",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub username: String,
    #[serde(default)]
    pub profile: String,
    pub user_id: String,
    #[serde(default)]
    pub last_updated: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForumThread {
    pub title: String,
    #[serde(default)]
    pub main_comment: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub author_id: Option<String>,
    #[serde(default)]
    pub author_username: Option<String>,
    #[serde(default)]
    pub created_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForumComment {
    pub text: String,
    #[serde(default)]
    pub author_id: Option<String>,
    #[serde(default)]
    pub author_username: Option<String>,
    #[serde(default)]
    pub created_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub text: String,
    pub sender_id: String,
    #[serde(default)]
    pub sender_username: Option<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// Key of the private room shared by two users; the same whichever of them
/// asks.
pub fn room_id(a: &str, b: &str) -> String {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    format!("{first}_{second}")
}

pub fn is_valid_link(link: &str) -> bool {
    link.len() > 5 && link != PLACEHOLDER_LINK
}

/// `dd/mm/yyyy` of a millisecond timestamp, empty while unresolved.
pub fn format_date(millis: Option<i64>) -> String {
    let Some(millis) = millis else {
        return String::new();
    };
    OffsetDateTime::from_unix_timestamp_nanos(millis as i128 * 1_000_000)
        .ok()
        .and_then(|at| at.format(format_description!("[day]/[month]/[year]")).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn room_ids_are_symmetric() {
        let pairs = [("alice", "bob"), ("zed", "amy"), ("same", "same"), ("", "x")];
        for (a, b) in pairs {
            assert_eq!(room_id(a, b), room_id(b, a));
        }
        assert_eq!(room_id("uB", "uA"), "uA_uB");
    }

    #[test]
    fn links_need_some_substance() {
        assert!(!is_valid_link("#"));
        assert!(!is_valid_link("http"));
        assert!(is_valid_link("https://example.com"));
    }

    #[test]
    fn articles_fill_placeholders() {
        let article: Article = serde_json::from_value(json!({ "title": "t" })).unwrap();
        assert_eq!(article.category, DEFAULT_CATEGORY);
        assert_eq!(article.image, PLACEHOLDER_IMAGE);
        assert_eq!(article.external_link(), None);

        let linked: Article = serde_json::from_value(json!({
            "title": "t",
            "originalLink": "https://valor.globo.com/x",
        }))
        .unwrap();
        assert_eq!(linked.external_link(), Some("https://valor.globo.com/x"));
    }

    #[test]
    fn dates_render_day_first() {
        // 2024-03-05T12:00:00Z
        assert_eq!(format_date(Some(1_709_640_000_000)), "05/03/2024");
        assert_eq!(format_date(None), "");
    }

    #[test]
    fn wire_names_are_camel_case() {
        let thread = ForumThread {
            title: "t".into(),
            main_comment: "m".into(),
            image_url: None,
            author_id: Some("u".into()),
            author_username: Some("Ana".into()),
            created_at: Some(1),
        };
        let value = serde_json::to_value(&thread).unwrap();
        assert_eq!(value["mainComment"], json!("m"));
        assert_eq!(value["authorUsername"], json!("Ana"));
    }
}
