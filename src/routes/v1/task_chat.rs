use crate::handlers::v1::task_chat;
use crate::{
    app_state::AppState,
    middlewares::auth::{admin_middleware, auth_middleware},
};
use axum::routing::{get, post};
use axum::{middleware, Router};

pub fn task_chat_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/{task_id}/messages", get(task_chat::get_messages))
        .route(
            "/{task_id}/complete",
            post(task_chat::complete_task).layer(middleware::from_fn(admin_middleware)),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}
