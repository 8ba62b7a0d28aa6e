use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

use crate::app_state::AppState;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "connections": state.websocket_manager.connection_count(),
    }))
}
