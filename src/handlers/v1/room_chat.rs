use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    app_state::AppState,
    error::AppResult,
    models::identity::Identity,
    services::room_chat::RoomOutgoing,
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomPayload {
    pub room_name: String,
    #[serde(default)]
    pub members: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomMessagePayload {
    pub text: String,
    pub temp_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditRoomMessagePayload {
    pub text: String,
}

pub async fn create_room(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<CreateRoomPayload>,
) -> AppResult<impl IntoResponse> {
    let room = state
        .room_chat
        .create_room(&identity, &payload.room_name, &payload.members)
        .await?;
    Ok((StatusCode::CREATED, Json(room)))
}

pub async fn list_rooms(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> AppResult<impl IntoResponse> {
    let rooms = state.room_chat.list_rooms(&identity).await?;
    Ok(Json(rooms))
}

pub async fn get_room(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(room_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let room = state.room_chat.get_room(&identity, room_id).await?;
    Ok(Json(room))
}

pub async fn delete_room(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(room_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    state.room_chat.delete_room(&identity, room_id).await?;
    Ok((StatusCode::OK, Json(json!({ "message": "Room deleted" }))))
}

pub async fn send_message(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(room_id): Path<Uuid>,
    Json(payload): Json<RoomMessagePayload>,
) -> AppResult<impl IntoResponse> {
    let outgoing = RoomOutgoing {
        text: payload.text,
        temp_id: payload.temp_id,
    };
    let message = state
        .room_chat
        .send_message(&identity, room_id, outgoing)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn get_messages(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(room_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let messages = state.room_chat.messages(&identity, room_id).await?;
    Ok(Json(messages))
}

pub async fn edit_message(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path((room_id, message_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<EditRoomMessagePayload>,
) -> AppResult<impl IntoResponse> {
    let message = state
        .room_chat
        .edit_message(&identity, room_id, message_id, &payload.text)
        .await?;
    Ok(Json(message))
}

pub async fn delete_message(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path((room_id, message_id)): Path<(Uuid, Uuid)>,
) -> AppResult<impl IntoResponse> {
    state
        .room_chat
        .delete_message(&identity, room_id, message_id)
        .await?;
    Ok((StatusCode::OK, Json(json!({ "message": "Message deleted" }))))
}

pub async fn delete_all_messages(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(room_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let deleted = state
        .room_chat
        .delete_all_messages(&identity, room_id)
        .await?;
    Ok(Json(json!({ "deleted": deleted })))
}
