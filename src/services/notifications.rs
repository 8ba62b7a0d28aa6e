//! Notification fan-out: durable record first, then either a live push to
//! the recipient's personal group or a spot in their offline queue.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::error::{ChatError, ChatResult};
use crate::models::identity::{Identity, TenantId};
use crate::models::notifications::{Notification, NotificationDraft};
use crate::models::websocket::ServerEvent;
use crate::store::{keys::StoreKey, KeyStore, NotificationStore};
use crate::websocket::manager::WebSocketManager;

pub const RECENT_LIMIT: usize = 50;

#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn NotificationStore>,
    keys: Arc<dyn KeyStore>,
    hub: WebSocketManager,
    ttl: chrono::Duration,
}

impl NotificationService {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        keys: Arc<dyn KeyStore>,
        hub: WebSocketManager,
        ttl: chrono::Duration,
    ) -> Self {
        Self {
            store,
            keys,
            hub,
            ttl,
        }
    }

    pub async fn notify(&self, tenant: &TenantId, draft: NotificationDraft) -> ChatResult<Notification> {
        draft
            .validate()
            .map_err(|e| ChatError::InvalidPayload(e.to_string()))?;

        let notification = draft.into_notification(tenant.clone(), self.ttl);
        self.store.create(&notification).await?;

        if self.hub.is_online(tenant, &notification.staff_id) {
            let pushed = self.hub.send_to_user(
                tenant,
                &notification.staff_id,
                ServerEvent::Notification(notification.clone()),
            );
            if pushed > 0 {
                return Ok(notification);
            }
        }

        self.enqueue_offline(&notification).await?;

        // the recipient may have connected and flushed while we were queueing
        if self.hub.is_online(tenant, &notification.staff_id) {
            self.deliver_queued(tenant, &notification.staff_id).await?;
        }
        Ok(notification)
    }

    async fn enqueue_offline(&self, notification: &Notification) -> ChatResult<()> {
        let payload = serde_json::to_string(notification).map_err(|e| {
            ChatError::Store(anyhow::anyhow!("Failed to serialize notification: {}", e))
        })?;
        let key = StoreKey::offline_queue(&notification.tenant_id, &notification.staff_id);
        self.keys.list_push(&key, &payload).await?;
        tracing::debug!(
            tenant = %notification.tenant_id,
            recipient = %notification.staff_id,
            "notification queued for offline recipient"
        );
        Ok(())
    }

    /// Pushes and clears everything queued while `identity` was offline.
    pub async fn flush_offline(&self, identity: &Identity) -> ChatResult<usize> {
        self.deliver_queued(&identity.tenant_id, &identity.user_id).await
    }

    async fn deliver_queued(&self, tenant: &TenantId, user_id: &str) -> ChatResult<usize> {
        let key = StoreKey::offline_queue(tenant, user_id);
        let queued = self.keys.list_drain(&key).await?;

        let mut flushed = 0;
        for payload in queued {
            let notification: Notification = match serde_json::from_str(&payload) {
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable queued notification");
                    continue;
                }
            };
            if &notification.tenant_id != tenant || notification.staff_id != user_id {
                tracing::warn!(id = %notification.id, "skipping queued notification for another recipient");
                continue;
            }
            self.hub
                .send_to_user(tenant, user_id, ServerEvent::Notification(notification));
            flushed += 1;
        }
        if flushed > 0 {
            tracing::debug!(tenant = %tenant, user = user_id, flushed, "offline notifications delivered");
        }
        Ok(flushed)
    }

    pub async fn list_recent(&self, identity: &Identity) -> ChatResult<Vec<Notification>> {
        self.store
            .list_recent(&identity.tenant_id, &identity.user_id, RECENT_LIMIT)
            .await
    }

    pub async fn mark_read(&self, identity: &Identity, notification_id: Uuid) -> ChatResult<()> {
        let updated = self
            .store
            .mark_read(&identity.tenant_id, &identity.user_id, notification_id)
            .await?;
        if !updated {
            return Err(ChatError::NotificationNotFound);
        }
        Ok(())
    }

    pub async fn mark_all_read(&self, identity: &Identity) -> ChatResult<u64> {
        self.store
            .mark_all_read(&identity.tenant_id, &identity.user_id)
            .await
    }

    pub async fn purge_expired(&self) -> ChatResult<u64> {
        self.store.purge_expired(Utc::now()).await
    }
}
