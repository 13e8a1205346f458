mod msg;
mod room;

use axum::{Router, routing::get};

use crate::{
    AppState, include_res,
    models::{ChatMessage, Profile, room_id},
    res,
    store::{Direction, Filter, Query, StoreResult, paths},
    sync::Doc,
};

pub use msg::{MessageForm, send_message};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(room::chat))
        .route("/users/ws", get(room::users_ws))
        .route("/{peer_id}", get(room::room).post(msg::post_message))
        .route("/{peer_id}/ws", get(room::room_ws))
}

/// Everyone with a profile except `user_id`.
pub fn others_query(user_id: &str) -> Query {
    Query::new(paths::profiles()).filter(Filter::not_eq("userId", user_id))
}

/// Messages between two users, oldest first.
pub fn messages_query(user_id: &str, peer_id: &str) -> StoreResult<Query> {
    Ok(Query::new(paths::chat_messages(&room_id(user_id, peer_id))?).order_by("timestamp", Direction::Ascending))
}

pub(crate) fn render_users(items: &[Doc<Profile>], selected: Option<&str>) -> String {
    if items.is_empty() {
        return r#"<li class="empty">Nenhum outro usuário cadastrado.</li>"#.to_owned();
    }

    items
        .iter()
        .map(|Doc { data: user, .. }| {
            include_res!(str, "/pages/chat/user_item.html")
                .replace("{selected}", if selected == Some(user.user_id.as_str()) { "selected" } else { "" })
                .replace("{user_id}", &res::escape(&user.user_id))
                .replace("{username}", &res::escape(&user.username))
                .replace("{profile}", &res::escape(&user.profile))
        })
        .collect()
}

pub(crate) fn render_messages(items: &[Doc<ChatMessage>], user_id: &str) -> String {
    items
        .iter()
        .map(|Doc { data: msg, .. }| {
            let own = msg.sender_id == user_id;
            let sender = match (&msg.sender_username, own) {
                (Some(name), false) => format!("<strong>{}</strong>", res::escape(name)),
                _ => String::new(),
            };
            include_res!(str, "/pages/chat/message.html")
                .replace("{side}", if own { "sent" } else { "received" })
                .replace("{sender}", &sender)
                .replace("{text}", &res::escape(&msg.text))
        })
        .collect()
}
