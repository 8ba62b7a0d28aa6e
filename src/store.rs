//! Persistence seams. The durable record store and the tenant-scoped key
//! store are collaborators; the services only see these traits.

pub mod keys;
pub mod memory;
pub mod postgres;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::ChatResult;
use crate::models::{
    identity::TenantId,
    messages::Message,
    notifications::Notification,
    rooms::{RoomChat, RoomMessage},
};
use keys::StoreKey;

/// Task-scoped 1:1 messages.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn insert(&self, message: &Message) -> ChatResult<()>;

    /// Every message of a task, oldest first.
    async fn history(&self, tenant: &TenantId, task_id: &str) -> ChatResult<Vec<Message>>;

    async fn find(&self, tenant: &TenantId, message_id: Uuid) -> ChatResult<Option<Message>>;

    /// Ids of messages in `task_id` addressed to `receiver_id` that are not delivered yet.
    async fn undelivered_for(
        &self,
        tenant: &TenantId,
        task_id: &str,
        receiver_id: &str,
    ) -> ChatResult<Vec<Uuid>>;

    async fn mark_delivered(&self, tenant: &TenantId, message_ids: &[Uuid]) -> ChatResult<()>;

    /// Marks every unread message addressed to `reader_id` as read and
    /// returns the ids that changed.
    async fn mark_read(
        &self,
        tenant: &TenantId,
        task_id: &str,
        reader_id: &str,
    ) -> ChatResult<Vec<Uuid>>;

    async fn update_text(
        &self,
        tenant: &TenantId,
        message_id: Uuid,
        text: &str,
    ) -> ChatResult<Option<Message>>;

    /// Hard-deletes the whole conversation of a task.
    async fn delete_for_task(&self, tenant: &TenantId, task_id: &str) -> ChatResult<u64>;
}

/// Room documents and their embedded message sequence.
#[async_trait]
pub trait RoomStore: Send + Sync {
    async fn create(&self, room: &RoomChat) -> ChatResult<()>;

    /// A live room with its messages. Soft-deleted rooms read as `None`.
    async fn find(&self, tenant: &TenantId, room_id: Uuid) -> ChatResult<Option<RoomChat>>;

    /// Live rooms `user_id` belongs to, newest first, without their messages.
    async fn list_for_member(&self, tenant: &TenantId, user_id: &str) -> ChatResult<Vec<RoomChat>>;

    async fn soft_delete(&self, tenant: &TenantId, room_id: Uuid) -> ChatResult<bool>;

    async fn append_message(
        &self,
        tenant: &TenantId,
        room_id: Uuid,
        message: &RoomMessage,
    ) -> ChatResult<()>;

    async fn update_message(
        &self,
        tenant: &TenantId,
        room_id: Uuid,
        message_id: Uuid,
        text: &str,
        edited_at: DateTime<Utc>,
    ) -> ChatResult<bool>;

    async fn remove_message(
        &self,
        tenant: &TenantId,
        room_id: Uuid,
        message_id: Uuid,
    ) -> ChatResult<bool>;

    async fn clear_messages(&self, tenant: &TenantId, room_id: Uuid) -> ChatResult<u64>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn create(&self, notification: &Notification) -> ChatResult<()>;

    /// Unexpired notifications of `staff_id`, newest first.
    async fn list_recent(
        &self,
        tenant: &TenantId,
        staff_id: &str,
        limit: usize,
    ) -> ChatResult<Vec<Notification>>;

    async fn mark_read(
        &self,
        tenant: &TenantId,
        staff_id: &str,
        notification_id: Uuid,
    ) -> ChatResult<bool>;

    async fn mark_all_read(&self, tenant: &TenantId, staff_id: &str) -> ChatResult<u64>;

    /// Drops notifications whose `expires_at` is before `now`.
    async fn purge_expired(&self, now: DateTime<Utc>) -> ChatResult<u64>;
}

/// Low-latency store with per-key expiry and push/drain lists.
#[async_trait]
pub trait KeyStore: Send + Sync {
    async fn get(&self, key: &StoreKey) -> ChatResult<Option<String>>;

    async fn set(&self, key: &StoreKey, value: &str, ttl: Option<Duration>) -> ChatResult<()>;

    async fn delete(&self, key: &StoreKey) -> ChatResult<()>;

    async fn exists(&self, key: &StoreKey) -> ChatResult<bool> {
        Ok(self.get(key).await?.is_some())
    }

    async fn list_push(&self, key: &StoreKey, value: &str) -> ChatResult<()>;

    /// Reads every element of the list and deletes it in one step.
    async fn list_drain(&self, key: &StoreKey) -> ChatResult<Vec<String>>;

    /// Drops keys whose TTL has elapsed.
    async fn purge_expired(&self) -> ChatResult<u64>;
}

/// Handles to every backend, built once at start-up.
#[derive(Clone)]
pub struct Stores {
    pub messages: Arc<dyn MessageStore>,
    pub rooms: Arc<dyn RoomStore>,
    pub notifications: Arc<dyn NotificationStore>,
    pub keys: Arc<dyn KeyStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            messages: Arc::new(memory::MemoryMessageStore::default()),
            rooms: Arc::new(memory::MemoryRoomStore::default()),
            notifications: Arc::new(memory::MemoryNotificationStore::default()),
            keys: Arc::new(memory::MemoryKeyStore::default()),
        }
    }

    pub fn postgres(pool: sqlx::PgPool) -> Self {
        Self {
            messages: Arc::new(postgres::PgMessageStore::new(pool.clone())),
            rooms: Arc::new(postgres::PgRoomStore::new(pool.clone())),
            notifications: Arc::new(postgres::PgNotificationStore::new(pool.clone())),
            keys: Arc::new(postgres::PgKeyStore::new(pool)),
        }
    }
}
