use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    error::{ChatError, ChatResult},
    models::{identity::TenantId, notifications::Notification},
};

pub async fn insert_notification(
    conn: &mut PgConnection,
    notification: &Notification,
) -> ChatResult<()> {
    sqlx::query(
        "INSERT INTO notifications (id, tenant_id, staff_id, notification_type, title, message, is_read, created_at, expires_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(notification.id)
    .bind(&notification.tenant_id)
    .bind(&notification.staff_id)
    .bind(notification.kind)
    .bind(&notification.title)
    .bind(&notification.message)
    .bind(notification.is_read)
    .bind(notification.created_at)
    .bind(notification.expires_at)
    .execute(conn)
    .await
    .map_err(|e| ChatError::Store(anyhow::anyhow!("Failed to create notification: {}", e)))?;

    Ok(())
}

pub async fn get_recent_notifications(
    conn: &mut PgConnection,
    tenant: &TenantId,
    staff_id: &str,
    limit: i64,
) -> ChatResult<Vec<Notification>> {
    let notifications = sqlx::query_as::<_, Notification>(
        "SELECT * FROM notifications \
         WHERE tenant_id = $1 AND staff_id = $2 AND expires_at > now() \
         ORDER BY created_at DESC LIMIT $3",
    )
    .bind(tenant)
    .bind(staff_id)
    .bind(limit)
    .fetch_all(conn)
    .await
    .map_err(|e| ChatError::Store(anyhow::anyhow!("Failed to fetch notifications: {}", e)))?;

    Ok(notifications)
}

pub async fn mark_notification_read(
    conn: &mut PgConnection,
    tenant: &TenantId,
    staff_id: &str,
    notification_id: Uuid,
) -> ChatResult<bool> {
    let result = sqlx::query(
        "UPDATE notifications SET is_read = true WHERE tenant_id = $1 AND staff_id = $2 AND id = $3",
    )
    .bind(tenant)
    .bind(staff_id)
    .bind(notification_id)
    .execute(conn)
    .await
    .map_err(|e| {
        ChatError::Store(anyhow::anyhow!("Failed to mark notification read: {}", e))
    })?;

    Ok(result.rows_affected() > 0)
}

pub async fn mark_all_notifications_read(
    conn: &mut PgConnection,
    tenant: &TenantId,
    staff_id: &str,
) -> ChatResult<u64> {
    let result = sqlx::query(
        "UPDATE notifications SET is_read = true WHERE tenant_id = $1 AND staff_id = $2 AND is_read = false",
    )
    .bind(tenant)
    .bind(staff_id)
    .execute(conn)
    .await
    .map_err(|e| {
        ChatError::Store(anyhow::anyhow!("Failed to mark notifications read: {}", e))
    })?;

    Ok(result.rows_affected())
}

pub async fn delete_expired_notifications(
    conn: &mut PgConnection,
    now: DateTime<Utc>,
) -> ChatResult<u64> {
    let result = sqlx::query("DELETE FROM notifications WHERE expires_at <= $1")
        .bind(now)
        .execute(conn)
        .await
        .map_err(|e| {
            ChatError::Store(anyhow::anyhow!("Failed to purge notifications: {}", e))
        })?;

    Ok(result.rows_affected())
}
