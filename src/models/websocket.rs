use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{messages::Message, notifications::Notification, rooms::RoomMessage};

/// Event sent by a client. Wire shape: `{"event": "<name>", "data": ...}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    JoinTaskRoom(String),
    SendMessage {
        task_id: String,
        receiver_id: String,
        message: String,
        temp_id: Option<String>,
    },
    Typing {
        task_id: String,
    },
    MarkRead {
        task_id: String,
    },
    EditMessage {
        message_id: Uuid,
        new_text: String,
        task_id: Option<String>,
    },
    JoinRoomChat(Uuid),
    LeaveRoomChat(Uuid),
    SendRoomMessage {
        room_id: Uuid,
        message: String,
        temp_id: Option<String>,
    },
    EditRoomMessage {
        room_id: Uuid,
        message_id: Uuid,
        new_text: String,
    },
    DeleteRoomMessage {
        room_id: Uuid,
        message_id: Uuid,
    },
    MarkRoomMessageRead {
        room_id: Uuid,
    },
    RoomTyping {
        room_id: Uuid,
    },
    #[serde(rename = "notification:get")]
    NotificationGet,
    #[serde(rename = "notification:read")]
    NotificationRead { notification_id: Uuid },
    #[serde(rename = "notification:markAllRead")]
    NotificationMarkAllRead,
    Ping,
}

impl ClientEvent {
    /// Client-side correlation id, echoed back on errors.
    pub fn temp_id(&self) -> Option<&str> {
        match self {
            Self::SendMessage { temp_id, .. } | Self::SendRoomMessage { temp_id, .. } => {
                temp_id.as_deref()
            }
            _ => None,
        }
    }
}

/// Event pushed to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    ChatHistory {
        task_id: String,
        messages: Vec<Message>,
    },
    MessageReceived {
        message: Message,
        temp_id: Option<String>,
    },
    MessageDelivered {
        task_id: String,
        message_ids: Vec<Uuid>,
    },
    MessageSeen {
        task_id: String,
        reader_id: String,
        message_ids: Vec<Uuid>,
    },
    MessageEdited {
        message: Message,
    },
    ChatAutoDeleted {
        task_id: String,
    },
    Typing {
        task_id: String,
        user_id: String,
        user_name: String,
    },
    RoomJoined {
        room_id: Uuid,
        messages: Vec<RoomMessage>,
    },
    RoomMessageReceived {
        room_id: Uuid,
        message: RoomMessage,
        temp_id: Option<String>,
    },
    RoomMessageEdited {
        room_id: Uuid,
        message: RoomMessage,
    },
    RoomMessageDeleted {
        room_id: Uuid,
        message_id: Uuid,
    },
    RoomMessagesCleared {
        room_id: Uuid,
    },
    RoomMessageDelivered {
        room_id: Uuid,
        message_id: Uuid,
        delivered_to: Vec<String>,
    },
    RoomMessageRead {
        room_id: Uuid,
        user_id: String,
        read_at: DateTime<Utc>,
    },
    RoomTyping {
        room_id: Uuid,
        user_id: String,
        user_name: String,
    },
    RoomDeleted {
        room_id: Uuid,
    },
    #[serde(rename = "notification:list")]
    NotificationList { notifications: Vec<Notification> },
    #[serde(rename = "notification")]
    Notification(Notification),
    Error {
        code: String,
        message: String,
        temp_id: Option<String>,
    },
    Pong,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_event_send_message_deserializes() {
        let json = r#"{"event":"sendMessage","data":{"taskId":"t1","receiverId":"u2","message":"hi","tempId":"tmp-1"}}"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        match event {
            ClientEvent::SendMessage {
                task_id,
                receiver_id,
                message,
                temp_id,
            } => {
                assert_eq!(task_id, "t1");
                assert_eq!(receiver_id, "u2");
                assert_eq!(message, "hi");
                assert_eq!(temp_id.as_deref(), Some("tmp-1"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn client_event_join_task_room_takes_bare_id() {
        let event: ClientEvent =
            serde_json::from_str(r#"{"event":"joinTaskRoom","data":"task-9"}"#).unwrap();
        assert!(matches!(event, ClientEvent::JoinTaskRoom(id) if id == "task-9"));
    }

    #[test]
    fn client_event_notification_names() {
        let event: ClientEvent =
            serde_json::from_str(r#"{"event":"notification:markAllRead"}"#).unwrap();
        assert!(matches!(event, ClientEvent::NotificationMarkAllRead));

        let id = Uuid::new_v4();
        let json = format!(r#"{{"event":"notification:read","data":{{"notificationId":"{id}"}}}}"#);
        let event: ClientEvent = serde_json::from_str(&json).unwrap();
        assert!(matches!(event, ClientEvent::NotificationRead { notification_id } if notification_id == id));
    }

    #[test]
    fn server_event_wire_shape() {
        let value = serde_json::to_value(ServerEvent::ChatAutoDeleted {
            task_id: "t1".into(),
        })
        .unwrap();
        assert_eq!(
            value,
            serde_json::json!({"event": "chatAutoDeleted", "data": {"taskId": "t1"}})
        );

        let value = serde_json::to_value(ServerEvent::Pong).unwrap();
        assert_eq!(value, serde_json::json!({"event": "pong"}));
    }
}
