pub mod notifications;
pub mod room_chat;
pub mod task_chat;
pub mod websocket;
use crate::app_state::AppState;
use axum::Router;

pub fn v1_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .nest("/room-chat", room_chat::room_chat_routes(state))
        .nest("/task-chat", task_chat::task_chat_routes(state))
        .nest("/notifications", notifications::notifications_routes(state))
        .merge(websocket::websocket_routes(state))
}
