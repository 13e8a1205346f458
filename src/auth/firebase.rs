use serde::Serialize;

use crate::{AppResult, GetField};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignUpRequest {
    return_secure_token: bool,
}

pub(super) fn signup_url(api_key: &str) -> String {
    format!("https://identitytoolkit.googleapis.com/v1/accounts:signUp?key={api_key}")
}

/// An empty sign-up creates an anonymous account; `localId` is its uid.
pub(super) async fn sign_up_anonymous(http_client: &reqwest::Client, signup_url: &str) -> AppResult<String> {
    let body: serde_json::Value = http_client
        .post(signup_url)
        .json(&SignUpRequest { return_secure_token: true })
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    body.get_str_field("localId")
}
