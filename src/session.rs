use tower_sessions::Session;

use crate::AppResult;

pub const USER_ID: &str = "user_id";

/// The anonymous identity of this session, if sign-in has succeeded.
pub async fn current_user(session: &Session) -> AppResult<Option<String>> {
    Ok(session.get::<String>(USER_ID).await?)
}
