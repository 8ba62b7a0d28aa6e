use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ChatError, ChatResult};
use crate::models::identity::TenantId;

pub const ROOM_NAME_MIN: usize = 3;
pub const ROOM_NAME_MAX: usize = 50;
pub const ROOM_MEMBER_LIMIT: usize = 50;

/// Message embedded in a room. Has no lifecycle outside its room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RoomMessage {
    pub id: Uuid,
    pub sender: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
}

impl RoomMessage {
    pub fn new(sender: &str, text: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender: sender.to_string(),
            text,
            timestamp: Utc::now(),
            edited: false,
            edited_at: None,
        }
    }
}

/// Named multi-member conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomChat {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub room_name: String,
    pub created_by: String,
    pub members: Vec<String>,
    pub messages: Vec<RoomMessage>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl RoomChat {
    /// Validates the name and member list and builds a fresh room.
    ///
    /// Members are trimmed, deduplicated and always include the creator.
    pub fn new(
        tenant_id: TenantId,
        room_name: &str,
        created_by: &str,
        invitees: &[String],
    ) -> ChatResult<Self> {
        let room_name = room_name.trim();
        let name_len = room_name.chars().count();
        if !(ROOM_NAME_MIN..=ROOM_NAME_MAX).contains(&name_len) {
            return Err(ChatError::RoomNameInvalidLength);
        }

        let mut members = vec![created_by.to_string()];
        for invitee in invitees {
            let invitee = invitee.trim();
            if invitee.is_empty() || members.iter().any(|m| m == invitee) {
                continue;
            }
            members.push(invitee.to_string());
        }
        if members.len() > ROOM_MEMBER_LIMIT {
            return Err(ChatError::RoomMemberLimitExceeded);
        }

        Ok(Self {
            id: Uuid::new_v4(),
            tenant_id,
            room_name: room_name.to_string(),
            created_by: created_by.to_string(),
            members,
            messages: Vec::new(),
            is_deleted: false,
            created_at: Utc::now(),
        })
    }

    pub fn is_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|m| m == user_id)
    }

    pub fn message(&self, message_id: Uuid) -> Option<&RoomMessage> {
        self.messages.iter().find(|m| m.id == message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant() -> TenantId {
        TenantId::new("acme")
    }

    fn name_of(len: usize) -> String {
        "r".repeat(len)
    }

    #[test]
    fn room_name_length_boundaries() {
        for (len, ok) in [(2, false), (3, true), (50, true), (51, false)] {
            let result = RoomChat::new(tenant(), &name_of(len), "owner", &[]);
            assert_eq!(result.is_ok(), ok, "name of length {len}");
            if let Err(e) = result {
                assert_eq!(e.code(), "ROOM_NAME_INVALID_LENGTH");
            }
        }
    }

    #[test]
    fn creator_is_always_a_member() {
        let room = RoomChat::new(tenant(), "ops", "owner", &["a".into(), "b".into()]).unwrap();
        assert_eq!(room.members, vec!["owner", "a", "b"]);
        assert!(room.is_member("owner"));
    }

    #[test]
    fn members_are_deduplicated() {
        let invitees = vec![
            "a".to_string(),
            " a ".to_string(),
            "owner".to_string(),
            "".to_string(),
        ];
        let room = RoomChat::new(tenant(), "ops", "owner", &invitees).unwrap();
        assert_eq!(room.members, vec!["owner", "a"]);
    }

    #[test]
    fn member_limit_counts_distinct_members_including_creator() {
        let mut invitees: Vec<String> = (0..49).map(|i| format!("user-{i}")).collect();
        // duplicates do not count against the limit
        invitees.push("user-0".into());
        let room = RoomChat::new(tenant(), "ops", "owner", &invitees).unwrap();
        assert_eq!(room.members.len(), 50);

        invitees.push("user-49".into());
        let err = RoomChat::new(tenant(), "ops", "owner", &invitees).unwrap_err();
        assert_eq!(err.code(), "ROOM_MEMBER_LIMIT_EXCEEDED");
    }
}
