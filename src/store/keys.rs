use std::fmt::Display;

use uuid::Uuid;

use crate::models::identity::TenantId;

/// Conversation a typing marker or broadcast group belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChatScope {
    Task(String),
    Room(Uuid),
}

impl Display for ChatScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatScope::Task(id) => write!(f, "task:{id}"),
            ChatScope::Room(id) => write!(f, "room:{id}"),
        }
    }
}

/// Key-store key. Only constructible from a tenant, so every entry is
/// namespaced as `<tenant>:<kind>:...`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreKey(String);

impl StoreKey {
    pub fn presence(tenant: &TenantId, user_id: &str) -> Self {
        Self(format!("{tenant}:presence:{user_id}"))
    }

    pub fn typing(tenant: &TenantId, scope: &ChatScope, user_id: &str) -> Self {
        Self(format!("{tenant}:typing:{scope}:{user_id}"))
    }

    pub fn room_read(tenant: &TenantId, room_id: Uuid, user_id: &str) -> Self {
        Self(format!("{tenant}:read:room:{room_id}:{user_id}"))
    }

    pub fn offline_queue(tenant: &TenantId, user_id: &str) -> Self {
        Self(format!("{tenant}:notifq:{user_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
