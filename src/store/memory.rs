//! In-process backends used when no `DATABASE_URL` is configured, and by tests.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::time::Instant;
use uuid::Uuid;

use super::{keys::StoreKey, KeyStore, MessageStore, NotificationStore, RoomStore};
use crate::error::ChatResult;
use crate::models::{
    identity::TenantId,
    messages::Message,
    notifications::Notification,
    rooms::{RoomChat, RoomMessage},
};

#[derive(Default)]
pub struct MemoryMessageStore {
    messages: DashMap<Uuid, Message>,
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn insert(&self, message: &Message) -> ChatResult<()> {
        self.messages.insert(message.id, message.clone());
        Ok(())
    }

    async fn history(&self, tenant: &TenantId, task_id: &str) -> ChatResult<Vec<Message>> {
        let mut history: Vec<Message> = self
            .messages
            .iter()
            .filter(|m| &m.tenant_id == tenant && m.task_id == task_id)
            .map(|m| m.value().clone())
            .collect();
        history.sort_by_key(|m| m.timestamp);
        Ok(history)
    }

    async fn find(&self, tenant: &TenantId, message_id: Uuid) -> ChatResult<Option<Message>> {
        Ok(self
            .messages
            .get(&message_id)
            .filter(|m| &m.tenant_id == tenant)
            .map(|m| m.value().clone()))
    }

    async fn undelivered_for(
        &self,
        tenant: &TenantId,
        task_id: &str,
        receiver_id: &str,
    ) -> ChatResult<Vec<Uuid>> {
        let mut pending: Vec<(DateTime<Utc>, Uuid)> = self
            .messages
            .iter()
            .filter(|m| {
                &m.tenant_id == tenant
                    && m.task_id == task_id
                    && m.receiver_id == receiver_id
                    && !m.delivered
            })
            .map(|m| (m.timestamp, m.id))
            .collect();
        pending.sort();
        Ok(pending.into_iter().map(|(_, id)| id).collect())
    }

    async fn mark_delivered(&self, tenant: &TenantId, message_ids: &[Uuid]) -> ChatResult<()> {
        for id in message_ids {
            if let Some(mut m) = self.messages.get_mut(id) {
                if &m.tenant_id == tenant {
                    m.delivered = true;
                }
            }
        }
        Ok(())
    }

    async fn mark_read(
        &self,
        tenant: &TenantId,
        task_id: &str,
        reader_id: &str,
    ) -> ChatResult<Vec<Uuid>> {
        let mut changed = Vec::new();
        for mut m in self.messages.iter_mut() {
            if &m.tenant_id == tenant && m.task_id == task_id && m.receiver_id == reader_id && !m.read
            {
                m.read = true;
                m.delivered = true;
                changed.push(m.id);
            }
        }
        Ok(changed)
    }

    async fn update_text(
        &self,
        tenant: &TenantId,
        message_id: Uuid,
        text: &str,
    ) -> ChatResult<Option<Message>> {
        Ok(self
            .messages
            .get_mut(&message_id)
            .filter(|m| &m.tenant_id == tenant)
            .map(|mut m| {
                m.text = text.to_string();
                m.edited = true;
                m.value().clone()
            }))
    }

    async fn delete_for_task(&self, tenant: &TenantId, task_id: &str) -> ChatResult<u64> {
        let before = self.messages.len();
        self.messages
            .retain(|_, m| !(&m.tenant_id == tenant && m.task_id == task_id));
        Ok((before - self.messages.len()) as u64)
    }
}

/// Room metadata plus its message log. Messages live in an append-only
/// sequence with an id→sequence index so edits and removals never scan.
struct RoomDocument {
    room: RoomChat,
    log: BTreeMap<u64, RoomMessage>,
    index: HashMap<Uuid, u64>,
    next_seq: u64,
}

impl RoomDocument {
    fn snapshot(&self) -> RoomChat {
        let mut room = self.room.clone();
        room.messages = self.log.values().cloned().collect();
        room
    }
}

#[derive(Default)]
pub struct MemoryRoomStore {
    rooms: DashMap<Uuid, RoomDocument>,
}

impl MemoryRoomStore {
    fn with_live_room<T>(
        &self,
        tenant: &TenantId,
        room_id: Uuid,
        f: impl FnOnce(&mut RoomDocument) -> T,
    ) -> Option<T> {
        let mut doc = self.rooms.get_mut(&room_id)?;
        if &doc.room.tenant_id != tenant || doc.room.is_deleted {
            return None;
        }
        Some(f(doc.value_mut()))
    }
}

#[async_trait]
impl RoomStore for MemoryRoomStore {
    async fn create(&self, room: &RoomChat) -> ChatResult<()> {
        let mut doc = RoomDocument {
            room: room.clone(),
            log: BTreeMap::new(),
            index: HashMap::new(),
            next_seq: 0,
        };
        for message in std::mem::take(&mut doc.room.messages) {
            doc.index.insert(message.id, doc.next_seq);
            doc.log.insert(doc.next_seq, message);
            doc.next_seq += 1;
        }
        self.rooms.insert(room.id, doc);
        Ok(())
    }

    async fn find(&self, tenant: &TenantId, room_id: Uuid) -> ChatResult<Option<RoomChat>> {
        Ok(self
            .rooms
            .get(&room_id)
            .filter(|doc| &doc.room.tenant_id == tenant && !doc.room.is_deleted)
            .map(|doc| doc.snapshot()))
    }

    async fn list_for_member(&self, tenant: &TenantId, user_id: &str) -> ChatResult<Vec<RoomChat>> {
        let mut rooms: Vec<RoomChat> = self
            .rooms
            .iter()
            .filter(|doc| {
                &doc.room.tenant_id == tenant && !doc.room.is_deleted && doc.room.is_member(user_id)
            })
            .map(|doc| doc.room.clone())
            .collect();
        rooms.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rooms)
    }

    async fn soft_delete(&self, tenant: &TenantId, room_id: Uuid) -> ChatResult<bool> {
        Ok(self
            .with_live_room(tenant, room_id, |doc| doc.room.is_deleted = true)
            .is_some())
    }

    async fn append_message(
        &self,
        tenant: &TenantId,
        room_id: Uuid,
        message: &RoomMessage,
    ) -> ChatResult<()> {
        self.with_live_room(tenant, room_id, |doc| {
            doc.index.insert(message.id, doc.next_seq);
            doc.log.insert(doc.next_seq, message.clone());
            doc.next_seq += 1;
        });
        Ok(())
    }

    async fn update_message(
        &self,
        tenant: &TenantId,
        room_id: Uuid,
        message_id: Uuid,
        text: &str,
        edited_at: DateTime<Utc>,
    ) -> ChatResult<bool> {
        Ok(self
            .with_live_room(tenant, room_id, |doc| {
                let Some(seq) = doc.index.get(&message_id) else {
                    return false;
                };
                match doc.log.get_mut(seq) {
                    Some(message) => {
                        message.text = text.to_string();
                        message.edited = true;
                        message.edited_at = Some(edited_at);
                        true
                    }
                    None => false,
                }
            })
            .unwrap_or(false))
    }

    async fn remove_message(
        &self,
        tenant: &TenantId,
        room_id: Uuid,
        message_id: Uuid,
    ) -> ChatResult<bool> {
        Ok(self
            .with_live_room(tenant, room_id, |doc| match doc.index.remove(&message_id) {
                Some(seq) => doc.log.remove(&seq).is_some(),
                None => false,
            })
            .unwrap_or(false))
    }

    async fn clear_messages(&self, tenant: &TenantId, room_id: Uuid) -> ChatResult<u64> {
        Ok(self
            .with_live_room(tenant, room_id, |doc| {
                let cleared = doc.log.len() as u64;
                doc.log.clear();
                doc.index.clear();
                cleared
            })
            .unwrap_or(0))
    }
}

#[derive(Default)]
pub struct MemoryNotificationStore {
    notifications: DashMap<Uuid, Notification>,
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn create(&self, notification: &Notification) -> ChatResult<()> {
        self.notifications
            .insert(notification.id, notification.clone());
        Ok(())
    }

    async fn list_recent(
        &self,
        tenant: &TenantId,
        staff_id: &str,
        limit: usize,
    ) -> ChatResult<Vec<Notification>> {
        let now = Utc::now();
        let mut recent: Vec<Notification> = self
            .notifications
            .iter()
            .filter(|n| &n.tenant_id == tenant && n.staff_id == staff_id && n.expires_at > now)
            .map(|n| n.value().clone())
            .collect();
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        recent.truncate(limit);
        Ok(recent)
    }

    async fn mark_read(
        &self,
        tenant: &TenantId,
        staff_id: &str,
        notification_id: Uuid,
    ) -> ChatResult<bool> {
        match self.notifications.get_mut(&notification_id) {
            Some(mut n) if &n.tenant_id == tenant && n.staff_id == staff_id => {
                n.is_read = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_all_read(&self, tenant: &TenantId, staff_id: &str) -> ChatResult<u64> {
        let mut updated = 0;
        for mut n in self.notifications.iter_mut() {
            if &n.tenant_id == tenant && n.staff_id == staff_id && !n.is_read {
                n.is_read = true;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> ChatResult<u64> {
        let before = self.notifications.len();
        self.notifications.retain(|_, n| n.expires_at > now);
        Ok((before - self.notifications.len()) as u64)
    }
}

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

#[derive(Default)]
pub struct MemoryKeyStore {
    entries: DashMap<String, Entry>,
    lists: DashMap<String, Vec<String>>,
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn get(&self, key: &StoreKey) -> ChatResult<Option<String>> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key.as_str()) {
            if entry.is_live(now) {
                return Ok(Some(entry.value.clone()));
            }
        }
        self.entries
            .remove_if(key.as_str(), |_, entry| !entry.is_live(now));
        Ok(None)
    }

    async fn set(&self, key: &StoreKey, value: &str, ttl: Option<Duration>) -> ChatResult<()> {
        self.entries.insert(
            key.as_str().to_string(),
            Entry {
                value: value.to_string(),
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &StoreKey) -> ChatResult<()> {
        self.entries.remove(key.as_str());
        Ok(())
    }

    async fn list_push(&self, key: &StoreKey, value: &str) -> ChatResult<()> {
        self.lists
            .entry(key.as_str().to_string())
            .or_default()
            .push(value.to_string());
        Ok(())
    }

    async fn list_drain(&self, key: &StoreKey) -> ChatResult<Vec<String>> {
        Ok(self
            .lists
            .remove(key.as_str())
            .map(|(_, values)| values)
            .unwrap_or_default())
    }

    async fn purge_expired(&self) -> ChatResult<u64> {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        Ok((before - self.entries.len()) as u64)
    }
}
