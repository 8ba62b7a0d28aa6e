use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{ChatError, ChatResult};
use crate::models::identity::{Identity, TenantId};
use crate::store::{
    keys::{ChatScope, StoreKey},
    KeyStore,
};

const MARKER: &str = "1";

/// Online flags, typing markers and room read timestamps, all kept in the
/// tenant-scoped key store.
#[derive(Clone)]
pub struct PresenceTracker {
    keys: Arc<dyn KeyStore>,
    typing_ttl: Duration,
}

impl PresenceTracker {
    pub fn new(keys: Arc<dyn KeyStore>, typing_ttl: Duration) -> Self {
        Self { keys, typing_ttl }
    }

    pub async fn set_online(&self, identity: &Identity) -> ChatResult<()> {
        let key = StoreKey::presence(&identity.tenant_id, &identity.user_id);
        self.keys.set(&key, MARKER, None).await
    }

    pub async fn set_offline(&self, tenant: &TenantId, user_id: &str) -> ChatResult<()> {
        self.keys.delete(&StoreKey::presence(tenant, user_id)).await
    }

    pub async fn is_online(&self, tenant: &TenantId, user_id: &str) -> ChatResult<bool> {
        self.keys.exists(&StoreKey::presence(tenant, user_id)).await
    }

    /// Typing markers expire on their own; there is no explicit clear.
    pub async fn set_typing(&self, identity: &Identity, scope: &ChatScope) -> ChatResult<()> {
        let key = StoreKey::typing(&identity.tenant_id, scope, &identity.user_id);
        self.keys.set(&key, MARKER, Some(self.typing_ttl)).await
    }

    pub async fn is_typing(
        &self,
        tenant: &TenantId,
        scope: &ChatScope,
        user_id: &str,
    ) -> ChatResult<bool> {
        self.keys
            .exists(&StoreKey::typing(tenant, scope, user_id))
            .await
    }

    pub async fn mark_room_read(&self, identity: &Identity, room_id: Uuid) -> ChatResult<DateTime<Utc>> {
        let now = Utc::now();
        let key = StoreKey::room_read(&identity.tenant_id, room_id, &identity.user_id);
        self.keys.set(&key, &now.to_rfc3339(), None).await?;
        Ok(now)
    }

    pub async fn room_read_at(
        &self,
        tenant: &TenantId,
        room_id: Uuid,
        user_id: &str,
    ) -> ChatResult<Option<DateTime<Utc>>> {
        let Some(raw) = self
            .keys
            .get(&StoreKey::room_read(tenant, room_id, user_id))
            .await?
        else {
            return Ok(None);
        };
        let at = DateTime::parse_from_rfc3339(&raw).map_err(|e| {
            ChatError::Store(anyhow::anyhow!("Corrupt read timestamp {}: {}", raw, e))
        })?;
        Ok(Some(at.with_timezone(&Utc)))
    }

    /// Drops typing markers and other keys whose TTL has run out.
    pub async fn purge_expired_markers(&self) -> ChatResult<u64> {
        self.keys.purge_expired().await
    }
}
