//! One authenticated connection: lifecycle plus inbound event dispatch.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use crate::app_state::AppState;
use crate::error::{ChatError, ChatResult, ErrorKind};
use crate::models::identity::Identity;
use crate::models::websocket::{ClientEvent, ServerEvent};
use crate::services::conversation::Conversation;
use crate::services::room_chat::RoomOutgoing;
use crate::services::task_chat::TaskOutgoing;
use crate::websocket::manager::ConnectionId;

pub struct Session {
    state: AppState,
    identity: Arc<Identity>,
    connection: ConnectionId,
}

impl Session {
    /// Registers the connection, marks the identity online and pushes any
    /// notifications queued while it was away.
    pub async fn open(
        state: AppState,
        identity: Identity,
        sender: UnboundedSender<ServerEvent>,
    ) -> Self {
        let identity = Arc::new(identity);
        let connection = state
            .websocket_manager
            .register(identity.clone(), sender);

        if let Err(e) = state.presence.set_online(&identity).await {
            tracing::warn!(error = %e, user = %identity.user_id, "could not record presence");
        }
        if let Err(e) = state.notifications.flush_offline(&identity).await {
            tracing::warn!(error = %e, user = %identity.user_id, "could not flush offline queue");
        }

        Self {
            state,
            identity,
            connection,
        }
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Drops the connection. Presence is cleared only when it was the
    /// identity's last one.
    pub async fn close(self) {
        let Some(gone) = self.state.websocket_manager.unregister(self.connection) else {
            return;
        };
        if gone.remaining > 0 {
            return;
        }
        if let Err(e) = self
            .state
            .presence
            .set_offline(&gone.identity.tenant_id, &gone.identity.user_id)
            .await
        {
            tracing::warn!(error = %e, user = %gone.identity.user_id, "could not clear presence");
        }
    }

    /// Parses and handles one text frame. Failures go back to this
    /// connection only.
    pub async fn handle_text(&self, text: &str) {
        let event: ClientEvent = match serde_json::from_str(text) {
            Ok(event) => event,
            Err(e) => {
                self.reply_error(&ChatError::InvalidPayload(e.to_string()), None);
                return;
            }
        };

        let temp_id = event.temp_id().map(str::to_string);
        if let Err(e) = self.dispatch(event).await {
            self.reply_error(&e, temp_id);
        }
    }

    fn reply(&self, event: ServerEvent) {
        self.state
            .websocket_manager
            .send_to_connection(self.connection, event);
    }

    fn reply_error(&self, error: &ChatError, temp_id: Option<String>) {
        if error.kind() == ErrorKind::Infrastructure {
            tracing::error!(
                error = %error,
                connection = %self.connection,
                user = %self.identity.user_id,
                "event failed on store access"
            );
        } else {
            tracing::debug!(code = error.code(), connection = %self.connection, "event rejected");
        }
        self.reply(ServerEvent::Error {
            code: error.code().to_string(),
            message: error.public_message(),
            temp_id,
        });
    }

    async fn dispatch(&self, event: ClientEvent) -> ChatResult<()> {
        let me = self.identity.as_ref();
        let task_chat = &self.state.task_chat;
        let room_chat = &self.state.room_chat;

        match event {
            ClientEvent::JoinTaskRoom(task_id) => {
                let messages = task_chat.join(me, self.connection, &task_id).await?;
                self.reply(ServerEvent::ChatHistory { task_id, messages });
            }
            ClientEvent::SendMessage {
                task_id,
                receiver_id,
                message,
                temp_id,
            } => {
                let outgoing = TaskOutgoing {
                    receiver_id,
                    text: message,
                    temp_id,
                };
                task_chat.send(me, &task_id, outgoing).await?;
            }
            ClientEvent::Typing { task_id } => task_chat.typing(me, &task_id).await?,
            ClientEvent::MarkRead { task_id } => task_chat.mark_read(me, &task_id).await?,
            ClientEvent::EditMessage {
                message_id,
                new_text,
                task_id,
            } => {
                match task_id {
                    Some(task_id) => task_chat.edit(me, &task_id, message_id, &new_text).await?,
                    None => task_chat.edit_by_id(me, message_id, &new_text).await?,
                };
            }
            ClientEvent::JoinRoomChat(room_id) => {
                let messages = room_chat.join(me, self.connection, &room_id).await?;
                self.reply(ServerEvent::RoomJoined { room_id, messages });
            }
            ClientEvent::LeaveRoomChat(room_id) => room_chat.leave(me, self.connection, &room_id),
            ClientEvent::SendRoomMessage {
                room_id,
                message,
                temp_id,
            } => {
                let outgoing = RoomOutgoing {
                    text: message,
                    temp_id,
                };
                room_chat.send(me, &room_id, outgoing).await?;
            }
            ClientEvent::EditRoomMessage {
                room_id,
                message_id,
                new_text,
            } => {
                room_chat.edit(me, &room_id, message_id, &new_text).await?;
            }
            ClientEvent::DeleteRoomMessage {
                room_id,
                message_id,
            } => room_chat.delete_message(me, room_id, message_id).await?,
            ClientEvent::MarkRoomMessageRead { room_id } => room_chat.mark_read(me, &room_id).await?,
            ClientEvent::RoomTyping { room_id } => room_chat.typing(me, &room_id).await?,
            ClientEvent::NotificationGet => self.reply_notification_list().await?,
            ClientEvent::NotificationRead { notification_id } => {
                self.state.notifications.mark_read(me, notification_id).await?;
                self.reply_notification_list().await?;
            }
            ClientEvent::NotificationMarkAllRead => {
                self.state.notifications.mark_all_read(me).await?;
                self.reply_notification_list().await?;
            }
            ClientEvent::Ping => self.reply(ServerEvent::Pong),
        }
        Ok(())
    }

    async fn reply_notification_list(&self) -> ChatResult<()> {
        let notifications = self.state.notifications.list_recent(&self.identity).await?;
        self.reply(ServerEvent::NotificationList { notifications });
        Ok(())
    }
}
