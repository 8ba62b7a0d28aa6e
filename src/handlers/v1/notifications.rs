use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    app_state::AppState,
    error::AppResult,
    models::{identity::Identity, notifications::NotificationDraft},
};

/// Producer entry point (task and leave modules). The recipient is always
/// resolved inside the caller's own tenant.
pub async fn create_notification(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(draft): Json<NotificationDraft>,
) -> AppResult<impl IntoResponse> {
    let notification = state
        .notifications
        .notify(&identity.tenant_id, draft)
        .await?;
    Ok((StatusCode::CREATED, Json(notification)))
}

pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> AppResult<impl IntoResponse> {
    let notifications = state.notifications.list_recent(&identity).await?;
    Ok(Json(notifications))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(notification_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    state
        .notifications
        .mark_read(&identity, notification_id)
        .await?;
    Ok(Json(json!({ "message": "Notification marked as read" })))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> AppResult<impl IntoResponse> {
    let updated = state.notifications.mark_all_read(&identity).await?;
    Ok(Json(json!({ "updated": updated })))
}
