use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::identity::{Identity, TenantId};

/// One line of a task's 1:1 conversation.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub task_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub receiver_id: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub delivered: bool,
    pub read: bool,
    pub edited: bool,
}

impl Message {
    /// New undelivered, unread message from `sender`. The tenant always comes
    /// from the sender's identity.
    pub fn new(sender: &Identity, task_id: &str, receiver_id: &str, text: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id: sender.tenant_id.clone(),
            task_id: task_id.to_string(),
            sender_id: sender.user_id.clone(),
            sender_name: sender.name.clone(),
            receiver_id: receiver_id.to_string(),
            text,
            timestamp: Utc::now(),
            delivered: false,
            read: false,
            edited: false,
        }
    }
}
