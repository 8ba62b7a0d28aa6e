use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension, Json,
};
use serde_json::json;

use crate::{app_state::AppState, error::AppResult, models::identity::Identity};

pub async fn get_messages(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(task_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let messages = state.task_chat.history(&identity, &task_id).await?;
    Ok(Json(messages))
}

/// Called by the task module when a task is completed. Admin routes only.
pub async fn complete_task(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(task_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let deleted = state
        .task_chat
        .close_task(&identity.tenant_id, &task_id)
        .await?;
    Ok(Json(json!({ "taskId": task_id, "deleted": deleted })))
}
