use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    error::{ChatError, ChatResult},
    models::{
        identity::TenantId,
        rooms::{RoomChat, RoomMessage},
    },
};

#[derive(sqlx::FromRow)]
pub struct RoomRow {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub room_name: String,
    pub created_by: String,
    pub members: Vec<String>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl RoomRow {
    pub fn into_room(self, messages: Vec<RoomMessage>) -> RoomChat {
        RoomChat {
            id: self.id,
            tenant_id: self.tenant_id,
            room_name: self.room_name,
            created_by: self.created_by,
            members: self.members,
            messages,
            is_deleted: self.is_deleted,
            created_at: self.created_at,
        }
    }
}

pub async fn insert_room(conn: &mut PgConnection, room: &RoomChat) -> ChatResult<()> {
    sqlx::query(
        "INSERT INTO room_chats (id, tenant_id, room_name, created_by, members, is_deleted, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(room.id)
    .bind(&room.tenant_id)
    .bind(&room.room_name)
    .bind(&room.created_by)
    .bind(&room.members)
    .bind(room.is_deleted)
    .bind(room.created_at)
    .execute(conn)
    .await
    .map_err(|e| ChatError::Store(anyhow::anyhow!("Failed to create room chat: {}", e)))?;

    Ok(())
}

pub async fn get_live_room(
    conn: &mut PgConnection,
    tenant: &TenantId,
    room_id: Uuid,
) -> ChatResult<Option<RoomRow>> {
    let room = sqlx::query_as::<_, RoomRow>(
        "SELECT * FROM room_chats WHERE tenant_id = $1 AND id = $2 AND is_deleted = false",
    )
    .bind(tenant)
    .bind(room_id)
    .fetch_optional(conn)
    .await
    .map_err(|e| ChatError::Store(anyhow::anyhow!("Failed to fetch room chat: {}", e)))?;

    Ok(room)
}

pub async fn get_rooms_for_member(
    conn: &mut PgConnection,
    tenant: &TenantId,
    user_id: &str,
) -> ChatResult<Vec<RoomRow>> {
    let rooms = sqlx::query_as::<_, RoomRow>(
        "SELECT * FROM room_chats \
         WHERE tenant_id = $1 AND $2 = ANY(members) AND is_deleted = false \
         ORDER BY created_at DESC",
    )
    .bind(tenant)
    .bind(user_id)
    .fetch_all(conn)
    .await
    .map_err(|e| ChatError::Store(anyhow::anyhow!("Failed to list room chats: {}", e)))?;

    Ok(rooms)
}

pub async fn soft_delete_room(
    conn: &mut PgConnection,
    tenant: &TenantId,
    room_id: Uuid,
) -> ChatResult<bool> {
    let result = sqlx::query(
        "UPDATE room_chats SET is_deleted = true WHERE tenant_id = $1 AND id = $2 AND is_deleted = false",
    )
    .bind(tenant)
    .bind(room_id)
    .execute(conn)
    .await
    .map_err(|e| ChatError::Store(anyhow::anyhow!("Failed to delete room chat: {}", e)))?;

    Ok(result.rows_affected() > 0)
}

pub async fn get_room_messages(
    conn: &mut PgConnection,
    room_id: Uuid,
) -> ChatResult<Vec<RoomMessage>> {
    let messages = sqlx::query_as::<_, RoomMessage>(
        "SELECT id, sender, text, timestamp, edited, edited_at FROM room_messages \
         WHERE room_id = $1 ORDER BY seq ASC",
    )
    .bind(room_id)
    .fetch_all(conn)
    .await
    .map_err(|e| ChatError::Store(anyhow::anyhow!("Failed to fetch room messages: {}", e)))?;

    Ok(messages)
}

// Every statement below joins on room_chats so a room id from another
// tenant (or a deleted room) matches nothing.

pub async fn insert_room_message(
    conn: &mut PgConnection,
    tenant: &TenantId,
    room_id: Uuid,
    message: &RoomMessage,
) -> ChatResult<()> {
    sqlx::query(
        "INSERT INTO room_messages (id, room_id, sender, text, timestamp, edited, edited_at) \
         SELECT $1, r.id, $3, $4, $5, $6, $7 FROM room_chats r \
         WHERE r.id = $2 AND r.tenant_id = $8 AND r.is_deleted = false",
    )
    .bind(message.id)
    .bind(room_id)
    .bind(&message.sender)
    .bind(&message.text)
    .bind(message.timestamp)
    .bind(message.edited)
    .bind(message.edited_at)
    .bind(tenant)
    .execute(conn)
    .await
    .map_err(|e| ChatError::Store(anyhow::anyhow!("Failed to append room message: {}", e)))?;

    Ok(())
}

pub async fn update_room_message(
    conn: &mut PgConnection,
    tenant: &TenantId,
    room_id: Uuid,
    message_id: Uuid,
    text: &str,
    edited_at: DateTime<Utc>,
) -> ChatResult<bool> {
    let result = sqlx::query(
        "UPDATE room_messages m SET text = $1, edited = true, edited_at = $2 \
         FROM room_chats r \
         WHERE m.room_id = r.id AND r.id = $3 AND r.tenant_id = $4 AND r.is_deleted = false AND m.id = $5",
    )
    .bind(text)
    .bind(edited_at)
    .bind(room_id)
    .bind(tenant)
    .bind(message_id)
    .execute(conn)
    .await
    .map_err(|e| ChatError::Store(anyhow::anyhow!("Failed to edit room message: {}", e)))?;

    Ok(result.rows_affected() > 0)
}

pub async fn delete_room_message(
    conn: &mut PgConnection,
    tenant: &TenantId,
    room_id: Uuid,
    message_id: Uuid,
) -> ChatResult<bool> {
    let result = sqlx::query(
        "DELETE FROM room_messages m USING room_chats r \
         WHERE m.room_id = r.id AND r.id = $1 AND r.tenant_id = $2 AND r.is_deleted = false AND m.id = $3",
    )
    .bind(room_id)
    .bind(tenant)
    .bind(message_id)
    .execute(conn)
    .await
    .map_err(|e| ChatError::Store(anyhow::anyhow!("Failed to delete room message: {}", e)))?;

    Ok(result.rows_affected() > 0)
}

pub async fn delete_all_room_messages(
    conn: &mut PgConnection,
    tenant: &TenantId,
    room_id: Uuid,
) -> ChatResult<u64> {
    let result = sqlx::query(
        "DELETE FROM room_messages m USING room_chats r \
         WHERE m.room_id = r.id AND r.id = $1 AND r.tenant_id = $2 AND r.is_deleted = false",
    )
    .bind(room_id)
    .bind(tenant)
    .execute(conn)
    .await
    .map_err(|e| ChatError::Store(anyhow::anyhow!("Failed to clear room messages: {}", e)))?;

    Ok(result.rows_affected())
}
