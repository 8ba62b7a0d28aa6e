use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    error::{ChatError, ChatResult},
    models::{identity::TenantId, messages::Message},
};

pub async fn insert_message(conn: &mut PgConnection, message: &Message) -> ChatResult<()> {
    sqlx::query(
        "INSERT INTO task_messages (id, tenant_id, task_id, sender_id, sender_name, receiver_id, text, timestamp, delivered, read, edited) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
    )
    .bind(message.id)
    .bind(&message.tenant_id)
    .bind(&message.task_id)
    .bind(&message.sender_id)
    .bind(&message.sender_name)
    .bind(&message.receiver_id)
    .bind(&message.text)
    .bind(message.timestamp)
    .bind(message.delivered)
    .bind(message.read)
    .bind(message.edited)
    .execute(conn)
    .await
    .map_err(|e| ChatError::Store(anyhow::anyhow!("Failed to insert task message: {}", e)))?;

    Ok(())
}

pub async fn get_task_history(
    conn: &mut PgConnection,
    tenant: &TenantId,
    task_id: &str,
) -> ChatResult<Vec<Message>> {
    let messages = sqlx::query_as::<_, Message>(
        "SELECT * FROM task_messages WHERE tenant_id = $1 AND task_id = $2 ORDER BY timestamp ASC",
    )
    .bind(tenant)
    .bind(task_id)
    .fetch_all(conn)
    .await
    .map_err(|e| ChatError::Store(anyhow::anyhow!("Failed to fetch task history: {}", e)))?;

    Ok(messages)
}

pub async fn get_message_by_id(
    conn: &mut PgConnection,
    tenant: &TenantId,
    message_id: Uuid,
) -> ChatResult<Option<Message>> {
    let message = sqlx::query_as::<_, Message>(
        "SELECT * FROM task_messages WHERE tenant_id = $1 AND id = $2",
    )
    .bind(tenant)
    .bind(message_id)
    .fetch_optional(conn)
    .await
    .map_err(|e| ChatError::Store(anyhow::anyhow!("Failed to fetch task message: {}", e)))?;

    Ok(message)
}

pub async fn get_undelivered_message_ids(
    conn: &mut PgConnection,
    tenant: &TenantId,
    task_id: &str,
    receiver_id: &str,
) -> ChatResult<Vec<Uuid>> {
    let ids: Vec<(Uuid,)> = sqlx::query_as(
        "SELECT id FROM task_messages \
         WHERE tenant_id = $1 AND task_id = $2 AND receiver_id = $3 AND delivered = false \
         ORDER BY timestamp ASC",
    )
    .bind(tenant)
    .bind(task_id)
    .bind(receiver_id)
    .fetch_all(conn)
    .await
    .map_err(|e| {
        ChatError::Store(anyhow::anyhow!("Failed to fetch undelivered messages: {}", e))
    })?;

    Ok(ids.into_iter().map(|(id,)| id).collect())
}

pub async fn mark_messages_delivered(
    conn: &mut PgConnection,
    tenant: &TenantId,
    message_ids: &[Uuid],
) -> ChatResult<()> {
    sqlx::query("UPDATE task_messages SET delivered = true WHERE tenant_id = $1 AND id = ANY($2)")
        .bind(tenant)
        .bind(message_ids)
        .execute(conn)
        .await
        .map_err(|e| {
            ChatError::Store(anyhow::anyhow!("Failed to mark messages delivered: {}", e))
        })?;

    Ok(())
}

pub async fn mark_task_messages_read(
    conn: &mut PgConnection,
    tenant: &TenantId,
    task_id: &str,
    reader_id: &str,
) -> ChatResult<Vec<Uuid>> {
    let ids: Vec<(Uuid,)> = sqlx::query_as(
        "UPDATE task_messages SET read = true, delivered = true \
         WHERE tenant_id = $1 AND task_id = $2 AND receiver_id = $3 AND read = false \
         RETURNING id",
    )
    .bind(tenant)
    .bind(task_id)
    .bind(reader_id)
    .fetch_all(conn)
    .await
    .map_err(|e| ChatError::Store(anyhow::anyhow!("Failed to mark messages read: {}", e)))?;

    Ok(ids.into_iter().map(|(id,)| id).collect())
}

pub async fn update_message_text(
    conn: &mut PgConnection,
    tenant: &TenantId,
    message_id: Uuid,
    text: &str,
) -> ChatResult<Option<Message>> {
    let message = sqlx::query_as::<_, Message>(
        "UPDATE task_messages SET text = $1, edited = true WHERE tenant_id = $2 AND id = $3 RETURNING *",
    )
    .bind(text)
    .bind(tenant)
    .bind(message_id)
    .fetch_optional(conn)
    .await
    .map_err(|e| ChatError::Store(anyhow::anyhow!("Failed to edit task message: {}", e)))?;

    Ok(message)
}

pub async fn delete_task_messages(
    conn: &mut PgConnection,
    tenant: &TenantId,
    task_id: &str,
) -> ChatResult<u64> {
    let result = sqlx::query("DELETE FROM task_messages WHERE tenant_id = $1 AND task_id = $2")
        .bind(tenant)
        .bind(task_id)
        .execute(conn)
        .await
        .map_err(|e| {
            ChatError::Store(anyhow::anyhow!("Failed to delete task messages: {}", e))
        })?;

    Ok(result.rows_affected())
}
