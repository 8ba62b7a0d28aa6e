use crate::handlers::v1::notifications;
use crate::{
    app_state::AppState,
    middlewares::auth::{admin_middleware, auth_middleware},
};
use axum::routing::{get, post, put};
use axum::{middleware, Router};

pub fn notifications_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(notifications::list_notifications).merge(
                post(notifications::create_notification)
                    .layer(middleware::from_fn(admin_middleware)),
            ),
        )
        .route("/read-all", put(notifications::mark_all_read))
        .route("/{notification_id}/read", put(notifications::mark_read))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}
