use std::str::FromStr;

use serde_json::Value;

use crate::{AppResult, GetField};

pub const DEFAULT_APP_ID: &str = "praxiscapital-default";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://praxiscapital.db?mode=rwc";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Connection settings for the hosted identity service.
#[derive(Debug, Clone)]
pub struct FirebaseConfig {
    pub api_key: String,
    pub project_id: Option<String>,
}

impl FirebaseConfig {
    /// Reads the web-app config object (`apiKey`, `projectId`, ...).
    pub fn from_json(json: &Value) -> AppResult<FirebaseConfig> {
        Ok(FirebaseConfig {
            api_key: json.get_str_field("apiKey")?,
            project_id: json.get_str_field("projectId").ok(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    /// `memory` selects the in-process store.
    pub database_url: String,
    /// Tenant the article collection is scoped under.
    pub app_id: String,
    pub firebase: Option<FirebaseConfig>,
    pub session_minutes: i64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_addr: DEFAULT_BIND_ADDR.to_owned(),
            database_url: DEFAULT_DATABASE_URL.to_owned(),
            app_id: DEFAULT_APP_ID.to_owned(),
            firebase: None,
            session_minutes: 60,
        }
    }
}

fn var_or(key: &str, default: &str) -> String {
    dotenv::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_owned())
}

impl Config {
    /// Environment (and `.env`) with the defaults above as fallbacks.
    pub fn from_env() -> AppResult<Config> {
        let defaults = Config::default();

        let firebase = match dotenv::var("FIREBASE_CONFIG") {
            Ok(raw) if !raw.trim().is_empty() => {
                Some(FirebaseConfig::from_json(&Value::from_str(&raw)?)?)
            }
            _ => None,
        };

        let session_minutes = dotenv::var("SESSION_MINUTES")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(defaults.session_minutes);

        Ok(Config {
            bind_addr: var_or("BIND_ADDR", &defaults.bind_addr),
            database_url: var_or("DATABASE_URL", &defaults.database_url),
            app_id: var_or("APP_ID", &defaults.app_id),
            firebase,
            session_minutes,
        })
    }

    /// In-memory store, local identities; what tests run against.
    pub fn in_memory() -> Config {
        Config { database_url: "memory".to_owned(), ..Config::default() }
    }
}
