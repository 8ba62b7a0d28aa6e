use crate::handlers::v1::room_chat;
use crate::{app_state::AppState, middlewares::auth::auth_middleware};
use axum::routing::{get, put};
use axum::{middleware, Router};

pub fn room_chat_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(room_chat::list_rooms).post(room_chat::create_room))
        .route(
            "/{room_id}",
            get(room_chat::get_room).delete(room_chat::delete_room),
        )
        .route("/{room_id}/message", axum::routing::post(room_chat::send_message))
        .route(
            "/{room_id}/messages",
            get(room_chat::get_messages).delete(room_chat::delete_all_messages),
        )
        .route(
            "/{room_id}/messages/{message_id}",
            put(room_chat::edit_message).delete(room_chat::delete_message),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}
