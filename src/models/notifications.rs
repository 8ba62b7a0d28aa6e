use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::identity::TenantId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    TaskAssigned,
    TaskDueSoon,
    TaskOverdue,
    TaskReviewed,
    LeaveApproved,
    LeaveRejected,
    Chat,
    RoomChat,
    General,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub staff_id: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "notification_type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Content of a notification before it is stamped and stored.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NotificationDraft {
    #[validate(length(min = 1, message = "Recipient cannot be empty"))]
    pub recipient_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    #[validate(length(min = 1, max = 500))]
    pub message: String,
}

impl NotificationDraft {
    pub fn new(
        recipient_id: impl Into<String>,
        kind: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            recipient_id: recipient_id.into(),
            kind,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn into_notification(self, tenant_id: TenantId, ttl: Duration) -> Notification {
        let created_at = Utc::now();
        Notification {
            id: Uuid::new_v4(),
            tenant_id,
            staff_id: self.recipient_id,
            kind: self.kind,
            title: self.title,
            message: self.message,
            is_read: false,
            created_at,
            expires_at: created_at + ttl,
        }
    }
}

/// Shortens chat text for a notification body.
pub fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}
