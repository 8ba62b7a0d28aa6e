use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use crate::error::{ChatError, ChatResult};

pub async fn get_live_value(conn: &mut PgConnection, key: &str) -> ChatResult<Option<String>> {
    let value: Option<(String,)> = sqlx::query_as(
        "SELECT value FROM kv_entries WHERE key = $1 AND (expires_at IS NULL OR expires_at > now())",
    )
    .bind(key)
    .fetch_optional(conn)
    .await
    .map_err(|e| ChatError::Store(anyhow::anyhow!("Failed to read key {}: {}", key, e)))?;

    Ok(value.map(|(v,)| v))
}

pub async fn upsert_value(
    conn: &mut PgConnection,
    key: &str,
    value: &str,
    expires_at: Option<DateTime<Utc>>,
) -> ChatResult<()> {
    sqlx::query(
        "INSERT INTO kv_entries (key, value, expires_at) VALUES ($1, $2, $3) \
         ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, expires_at = EXCLUDED.expires_at",
    )
    .bind(key)
    .bind(value)
    .bind(expires_at)
    .execute(conn)
    .await
    .map_err(|e| ChatError::Store(anyhow::anyhow!("Failed to write key {}: {}", key, e)))?;

    Ok(())
}

pub async fn delete_value(conn: &mut PgConnection, key: &str) -> ChatResult<()> {
    sqlx::query("DELETE FROM kv_entries WHERE key = $1")
        .bind(key)
        .execute(conn)
        .await
        .map_err(|e| ChatError::Store(anyhow::anyhow!("Failed to delete key {}: {}", key, e)))?;

    Ok(())
}

pub async fn push_list_value(conn: &mut PgConnection, key: &str, value: &str) -> ChatResult<()> {
    sqlx::query("INSERT INTO kv_lists (key, value) VALUES ($1, $2)")
        .bind(key)
        .bind(value)
        .execute(conn)
        .await
        .map_err(|e| ChatError::Store(anyhow::anyhow!("Failed to push to list {}: {}", key, e)))?;

    Ok(())
}

/// Single statement, so a concurrent drain of the same key never sees an
/// element twice.
pub async fn drain_list(conn: &mut PgConnection, key: &str) -> ChatResult<Vec<String>> {
    let mut rows: Vec<(i64, String)> =
        sqlx::query_as("DELETE FROM kv_lists WHERE key = $1 RETURNING id, value")
            .bind(key)
            .fetch_all(conn)
            .await
            .map_err(|e| {
                ChatError::Store(anyhow::anyhow!("Failed to drain list {}: {}", key, e))
            })?;

    rows.sort_by_key(|(id, _)| *id);
    Ok(rows.into_iter().map(|(_, value)| value).collect())
}

pub async fn delete_expired_values(conn: &mut PgConnection) -> ChatResult<u64> {
    let result = sqlx::query("DELETE FROM kv_entries WHERE expires_at IS NOT NULL AND expires_at <= now()")
        .execute(conn)
        .await
        .map_err(|e| ChatError::Store(anyhow::anyhow!("Failed to purge expired keys: {}", e)))?;

    Ok(result.rows_affected())
}
