//! Postgres backends. Each call checks out one pooled connection and
//! delegates to the statements in `crate::queries`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{pool::PoolConnection, PgPool, Postgres};
use uuid::Uuid;

use super::{keys::StoreKey, KeyStore, MessageStore, NotificationStore, RoomStore};
use crate::error::{ChatError, ChatResult};
use crate::models::{
    identity::TenantId,
    messages::Message,
    notifications::Notification,
    rooms::{RoomChat, RoomMessage},
};
use crate::queries::{key_values, messages, notifications, rooms};

async fn acquire(pool: &PgPool) -> ChatResult<PoolConnection<Postgres>> {
    pool.acquire().await.map_err(|e| {
        ChatError::Store(anyhow::anyhow!(
            "Failed to acquire database connection: {}",
            e
        ))
    })
}

pub struct PgMessageStore {
    pool: PgPool,
}

impl PgMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn insert(&self, message: &Message) -> ChatResult<()> {
        let mut conn = acquire(&self.pool).await?;
        messages::insert_message(&mut conn, message).await
    }

    async fn history(&self, tenant: &TenantId, task_id: &str) -> ChatResult<Vec<Message>> {
        let mut conn = acquire(&self.pool).await?;
        messages::get_task_history(&mut conn, tenant, task_id).await
    }

    async fn find(&self, tenant: &TenantId, message_id: Uuid) -> ChatResult<Option<Message>> {
        let mut conn = acquire(&self.pool).await?;
        messages::get_message_by_id(&mut conn, tenant, message_id).await
    }

    async fn undelivered_for(
        &self,
        tenant: &TenantId,
        task_id: &str,
        receiver_id: &str,
    ) -> ChatResult<Vec<Uuid>> {
        let mut conn = acquire(&self.pool).await?;
        messages::get_undelivered_message_ids(&mut conn, tenant, task_id, receiver_id).await
    }

    async fn mark_delivered(&self, tenant: &TenantId, message_ids: &[Uuid]) -> ChatResult<()> {
        if message_ids.is_empty() {
            return Ok(());
        }
        let mut conn = acquire(&self.pool).await?;
        messages::mark_messages_delivered(&mut conn, tenant, message_ids).await
    }

    async fn mark_read(
        &self,
        tenant: &TenantId,
        task_id: &str,
        reader_id: &str,
    ) -> ChatResult<Vec<Uuid>> {
        let mut conn = acquire(&self.pool).await?;
        messages::mark_task_messages_read(&mut conn, tenant, task_id, reader_id).await
    }

    async fn update_text(
        &self,
        tenant: &TenantId,
        message_id: Uuid,
        text: &str,
    ) -> ChatResult<Option<Message>> {
        let mut conn = acquire(&self.pool).await?;
        messages::update_message_text(&mut conn, tenant, message_id, text).await
    }

    async fn delete_for_task(&self, tenant: &TenantId, task_id: &str) -> ChatResult<u64> {
        let mut conn = acquire(&self.pool).await?;
        messages::delete_task_messages(&mut conn, tenant, task_id).await
    }
}

pub struct PgRoomStore {
    pool: PgPool,
}

impl PgRoomStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoomStore for PgRoomStore {
    async fn create(&self, room: &RoomChat) -> ChatResult<()> {
        let mut conn = acquire(&self.pool).await?;
        rooms::insert_room(&mut conn, room).await
    }

    async fn find(&self, tenant: &TenantId, room_id: Uuid) -> ChatResult<Option<RoomChat>> {
        let mut conn = acquire(&self.pool).await?;
        let Some(row) = rooms::get_live_room(&mut conn, tenant, room_id).await? else {
            return Ok(None);
        };
        let messages = rooms::get_room_messages(&mut conn, room_id).await?;
        Ok(Some(row.into_room(messages)))
    }

    async fn list_for_member(&self, tenant: &TenantId, user_id: &str) -> ChatResult<Vec<RoomChat>> {
        let mut conn = acquire(&self.pool).await?;
        let rows = rooms::get_rooms_for_member(&mut conn, tenant, user_id).await?;
        Ok(rows.into_iter().map(|row| row.into_room(Vec::new())).collect())
    }

    async fn soft_delete(&self, tenant: &TenantId, room_id: Uuid) -> ChatResult<bool> {
        let mut conn = acquire(&self.pool).await?;
        rooms::soft_delete_room(&mut conn, tenant, room_id).await
    }

    async fn append_message(
        &self,
        tenant: &TenantId,
        room_id: Uuid,
        message: &RoomMessage,
    ) -> ChatResult<()> {
        let mut conn = acquire(&self.pool).await?;
        rooms::insert_room_message(&mut conn, tenant, room_id, message).await
    }

    async fn update_message(
        &self,
        tenant: &TenantId,
        room_id: Uuid,
        message_id: Uuid,
        text: &str,
        edited_at: DateTime<Utc>,
    ) -> ChatResult<bool> {
        let mut conn = acquire(&self.pool).await?;
        rooms::update_room_message(&mut conn, tenant, room_id, message_id, text, edited_at).await
    }

    async fn remove_message(
        &self,
        tenant: &TenantId,
        room_id: Uuid,
        message_id: Uuid,
    ) -> ChatResult<bool> {
        let mut conn = acquire(&self.pool).await?;
        rooms::delete_room_message(&mut conn, tenant, room_id, message_id).await
    }

    async fn clear_messages(&self, tenant: &TenantId, room_id: Uuid) -> ChatResult<u64> {
        let mut conn = acquire(&self.pool).await?;
        rooms::delete_all_room_messages(&mut conn, tenant, room_id).await
    }
}

pub struct PgNotificationStore {
    pool: PgPool,
}

impl PgNotificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationStore for PgNotificationStore {
    async fn create(&self, notification: &Notification) -> ChatResult<()> {
        let mut conn = acquire(&self.pool).await?;
        notifications::insert_notification(&mut conn, notification).await
    }

    async fn list_recent(
        &self,
        tenant: &TenantId,
        staff_id: &str,
        limit: usize,
    ) -> ChatResult<Vec<Notification>> {
        let mut conn = acquire(&self.pool).await?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        notifications::get_recent_notifications(&mut conn, tenant, staff_id, limit).await
    }

    async fn mark_read(
        &self,
        tenant: &TenantId,
        staff_id: &str,
        notification_id: Uuid,
    ) -> ChatResult<bool> {
        let mut conn = acquire(&self.pool).await?;
        notifications::mark_notification_read(&mut conn, tenant, staff_id, notification_id).await
    }

    async fn mark_all_read(&self, tenant: &TenantId, staff_id: &str) -> ChatResult<u64> {
        let mut conn = acquire(&self.pool).await?;
        notifications::mark_all_notifications_read(&mut conn, tenant, staff_id).await
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> ChatResult<u64> {
        let mut conn = acquire(&self.pool).await?;
        notifications::delete_expired_notifications(&mut conn, now).await
    }
}

pub struct PgKeyStore {
    pool: PgPool,
}

impl PgKeyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KeyStore for PgKeyStore {
    async fn get(&self, key: &StoreKey) -> ChatResult<Option<String>> {
        let mut conn = acquire(&self.pool).await?;
        key_values::get_live_value(&mut conn, key.as_str()).await
    }

    async fn set(&self, key: &StoreKey, value: &str, ttl: Option<Duration>) -> ChatResult<()> {
        let expires_at = match ttl {
            Some(ttl) => Some(
                Utc::now()
                    + chrono::Duration::from_std(ttl).map_err(|e| {
                        ChatError::Store(anyhow::anyhow!("Invalid TTL for {}: {}", key.as_str(), e))
                    })?,
            ),
            None => None,
        };
        let mut conn = acquire(&self.pool).await?;
        key_values::upsert_value(&mut conn, key.as_str(), value, expires_at).await
    }

    async fn delete(&self, key: &StoreKey) -> ChatResult<()> {
        let mut conn = acquire(&self.pool).await?;
        key_values::delete_value(&mut conn, key.as_str()).await
    }

    async fn list_push(&self, key: &StoreKey, value: &str) -> ChatResult<()> {
        let mut conn = acquire(&self.pool).await?;
        key_values::push_list_value(&mut conn, key.as_str(), value).await
    }

    async fn list_drain(&self, key: &StoreKey) -> ChatResult<Vec<String>> {
        let mut conn = acquire(&self.pool).await?;
        key_values::drain_list(&mut conn, key.as_str()).await
    }

    async fn purge_expired(&self) -> ChatResult<u64> {
        let mut conn = acquire(&self.pool).await?;
        key_values::delete_expired_values(&mut conn).await
    }
}
