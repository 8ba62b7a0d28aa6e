//! Persistent multi-member rooms with an embedded, ordered message log.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::error::{ChatError, ChatResult};
use crate::models::identity::Identity;
use crate::models::notifications::{preview, NotificationDraft, NotificationType};
use crate::models::rooms::{RoomChat, RoomMessage};
use crate::models::websocket::ServerEvent;
use crate::services::conversation::{validate_text, Conversation};
use crate::services::locks::KeyedLocks;
use crate::services::notifications::NotificationService;
use crate::services::presence::PresenceTracker;
use crate::services::rate_limiter::RateLimiter;
use crate::store::{keys::ChatScope, RoomStore};
use crate::websocket::manager::{ConnectionId, Group, WebSocketManager};

#[derive(Debug, Clone)]
pub struct RoomOutgoing {
    pub text: String,
    pub temp_id: Option<String>,
}

#[derive(Clone)]
pub struct RoomChatChannel {
    rooms: Arc<dyn RoomStore>,
    hub: WebSocketManager,
    presence: PresenceTracker,
    limiter: RateLimiter,
    notifications: NotificationService,
    max_text_len: usize,
    // serializes read-modify-write on one room document
    locks: KeyedLocks<Uuid>,
}

impl RoomChatChannel {
    pub fn new(
        rooms: Arc<dyn RoomStore>,
        hub: WebSocketManager,
        presence: PresenceTracker,
        limiter: RateLimiter,
        notifications: NotificationService,
        max_text_len: usize,
    ) -> Self {
        Self {
            rooms,
            hub,
            presence,
            limiter,
            notifications,
            max_text_len,
            locks: KeyedLocks::new(),
        }
    }

    /// Live room the caller belongs to. Rooms of other tenants, deleted rooms
    /// and rooms the caller is not in all read as missing.
    async fn visible_room(&self, caller: &Identity, room_id: Uuid) -> ChatResult<RoomChat> {
        self.rooms
            .find(&caller.tenant_id, room_id)
            .await?
            .filter(|room| room.is_member(&caller.user_id))
            .ok_or(ChatError::RoomNotFound)
    }

    /// Live room of the caller's tenant, member or not.
    async fn live_room(&self, caller: &Identity, room_id: Uuid) -> ChatResult<RoomChat> {
        self.rooms
            .find(&caller.tenant_id, room_id)
            .await?
            .ok_or(ChatError::RoomNotFound)
    }

    pub async fn create_room(
        &self,
        caller: &Identity,
        room_name: &str,
        members: &[String],
    ) -> ChatResult<RoomChat> {
        let room = RoomChat::new(caller.tenant_id.clone(), room_name, &caller.user_id, members)?;
        self.rooms.create(&room).await?;
        tracing::info!(
            tenant = %room.tenant_id,
            room = %room.id,
            members = room.members.len(),
            "room created"
        );
        Ok(room)
    }

    pub async fn get_room(&self, caller: &Identity, room_id: Uuid) -> ChatResult<RoomChat> {
        self.visible_room(caller, room_id).await
    }

    pub async fn list_rooms(&self, caller: &Identity) -> ChatResult<Vec<RoomChat>> {
        self.rooms
            .list_for_member(&caller.tenant_id, &caller.user_id)
            .await
    }

    pub async fn messages(&self, caller: &Identity, room_id: Uuid) -> ChatResult<Vec<RoomMessage>> {
        Ok(self.visible_room(caller, room_id).await?.messages)
    }

    /// Soft-deletes a room. Only its creator may do this.
    pub async fn delete_room(&self, caller: &Identity, room_id: Uuid) -> ChatResult<()> {
        {
            let _guard = self.locks.lock(room_id).await;
            let room = self.visible_room(caller, room_id).await?;
            if room.created_by != caller.user_id {
                return Err(ChatError::OnlyCreatorCanDeleteRoom);
            }
            if !self.rooms.soft_delete(&caller.tenant_id, room_id).await? {
                return Err(ChatError::RoomNotFound);
            }
        }

        let group = Group::room(&caller.tenant_id, room_id);
        self.hub
            .broadcast(&group, ServerEvent::RoomDeleted { room_id }, None);
        self.hub.evict_group(&group);
        tracing::info!(tenant = %caller.tenant_id, room = %room_id, "room deleted");
        Ok(())
    }

    pub async fn send_message(
        &self,
        caller: &Identity,
        room_id: Uuid,
        outgoing: RoomOutgoing,
    ) -> ChatResult<RoomMessage> {
        let (room, message) = {
            let _guard = self.locks.lock(room_id).await;
            let room = self.live_room(caller, room_id).await?;
            if !room.is_member(&caller.user_id) {
                return Err(ChatError::SenderNotInRoom);
            }
            let text = validate_text(&outgoing.text, self.max_text_len)?;
            self.limiter.check(&caller.scoped_key())?;

            let message = RoomMessage::new(&caller.user_id, text);
            self.rooms
                .append_message(&caller.tenant_id, room_id, &message)
                .await?;

            // still under the room lock, so fan-out order matches log order
            let group = Group::room(&caller.tenant_id, room_id);
            self.hub.broadcast(
                &group,
                ServerEvent::RoomMessageReceived {
                    room_id,
                    message: message.clone(),
                    temp_id: outgoing.temp_id,
                },
                None,
            );

            let present = self.hub.users_in_group(&group);
            let delivered_to: Vec<String> = room
                .members
                .iter()
                .filter(|m| *m != &caller.user_id && present.contains(*m))
                .cloned()
                .collect();
            if !delivered_to.is_empty() {
                self.hub.broadcast(
                    &group,
                    ServerEvent::RoomMessageDelivered {
                        room_id,
                        message_id: message.id,
                        delivered_to,
                    },
                    None,
                );
            }
            (room, message)
        };

        for member in room.members.iter().filter(|m| *m != &caller.user_id) {
            let draft = NotificationDraft::new(
                member.clone(),
                NotificationType::RoomChat,
                preview(&format!("{}: new message", room.room_name), 100),
                preview(&format!("{}: {}", caller.name, message.text), 500),
            );
            if let Err(e) = self.notifications.notify(&caller.tenant_id, draft).await {
                tracing::warn!(error = %e, room = %room_id, recipient = %member, "room notification failed");
            }
        }

        Ok(message)
    }

    pub async fn edit_message(
        &self,
        caller: &Identity,
        room_id: Uuid,
        message_id: Uuid,
        new_text: &str,
    ) -> ChatResult<RoomMessage> {
        let text = validate_text(new_text, self.max_text_len)?;
        let _guard = self.locks.lock(room_id).await;
        let room = self.live_room(caller, room_id).await?;
        let mut message = room
            .message(message_id)
            .cloned()
            .ok_or(ChatError::MessageNotFound)?;
        if message.sender != caller.user_id {
            return Err(ChatError::NotAllowedToEdit);
        }

        let edited_at = Utc::now();
        if !self
            .rooms
            .update_message(&caller.tenant_id, room_id, message_id, &text, edited_at)
            .await?
        {
            return Err(ChatError::MessageNotFound);
        }
        message.text = text;
        message.edited = true;
        message.edited_at = Some(edited_at);

        self.hub.broadcast(
            &Group::room(&caller.tenant_id, room_id),
            ServerEvent::RoomMessageEdited {
                room_id,
                message: message.clone(),
            },
            None,
        );
        Ok(message)
    }

    pub async fn delete_message(
        &self,
        caller: &Identity,
        room_id: Uuid,
        message_id: Uuid,
    ) -> ChatResult<()> {
        let _guard = self.locks.lock(room_id).await;
        let room = self.live_room(caller, room_id).await?;
        let message = room.message(message_id).ok_or(ChatError::MessageNotFound)?;
        if message.sender != caller.user_id {
            return Err(ChatError::NotAllowedToDelete);
        }
        if !self
            .rooms
            .remove_message(&caller.tenant_id, room_id, message_id)
            .await?
        {
            return Err(ChatError::MessageNotFound);
        }

        self.hub.broadcast(
            &Group::room(&caller.tenant_id, room_id),
            ServerEvent::RoomMessageDeleted {
                room_id,
                message_id,
            },
            None,
        );
        Ok(())
    }

    /// Empties the message log. Allowed for the room's creator and admins.
    pub async fn delete_all_messages(&self, caller: &Identity, room_id: Uuid) -> ChatResult<u64> {
        let _guard = self.locks.lock(room_id).await;
        let room = self.visible_room(caller, room_id).await?;
        if room.created_by != caller.user_id && !caller.is_admin() {
            return Err(ChatError::NotAllowedToClearRoom);
        }
        let cleared = self.rooms.clear_messages(&caller.tenant_id, room_id).await?;

        self.hub.broadcast(
            &Group::room(&caller.tenant_id, room_id),
            ServerEvent::RoomMessagesCleared { room_id },
            None,
        );
        Ok(cleared)
    }
}

#[async_trait]
impl Conversation for RoomChatChannel {
    type Key = Uuid;
    type Outgoing = RoomOutgoing;
    type Record = RoomMessage;

    fn hub(&self) -> &WebSocketManager {
        &self.hub
    }

    fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    fn scope(&self, room_id: &Uuid) -> ChatScope {
        ChatScope::Room(*room_id)
    }

    fn typing_event(&self, caller: &Identity, room_id: &Uuid) -> ServerEvent {
        ServerEvent::RoomTyping {
            room_id: *room_id,
            user_id: caller.user_id.clone(),
            user_name: caller.name.clone(),
        }
    }

    async fn authorize(&self, caller: &Identity, room_id: &Uuid) -> ChatResult<()> {
        self.visible_room(caller, *room_id).await.map(|_| ())
    }

    async fn join(
        &self,
        caller: &Identity,
        connection: ConnectionId,
        room_id: &Uuid,
    ) -> ChatResult<Vec<RoomMessage>> {
        let room = self.visible_room(caller, *room_id).await?;
        self.hub.join(connection, self.group(caller, room_id));
        Ok(room.messages)
    }

    async fn send(
        &self,
        caller: &Identity,
        room_id: &Uuid,
        outgoing: RoomOutgoing,
    ) -> ChatResult<RoomMessage> {
        self.send_message(caller, *room_id, outgoing).await
    }

    async fn edit(
        &self,
        caller: &Identity,
        room_id: &Uuid,
        message_id: Uuid,
        new_text: &str,
    ) -> ChatResult<RoomMessage> {
        self.edit_message(caller, *room_id, message_id, new_text).await
    }

    async fn mark_read(&self, caller: &Identity, room_id: &Uuid) -> ChatResult<()> {
        self.authorize(caller, room_id).await?;
        let read_at = self.presence.mark_room_read(caller, *room_id).await?;
        self.hub.broadcast(
            &self.group(caller, room_id),
            ServerEvent::RoomMessageRead {
                room_id: *room_id,
                user_id: caller.user_id.clone(),
                read_at,
            },
            None,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{admin, connect, drain_events, identity, TestApp};

    fn text(body: &str) -> RoomOutgoing {
        RoomOutgoing {
            text: body.to_string(),
            temp_id: None,
        }
    }

    fn members(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn creator_is_always_a_member() {
        let app = TestApp::new();
        let alice = identity("acme", "alice");
        let room = app
            .state
            .room_chat
            .create_room(&alice, "  Night shift  ", &members(&["bob", "bob", " "]))
            .await
            .unwrap();
        assert_eq!(room.room_name, "Night shift");
        assert_eq!(room.members, members(&["alice", "bob"]));

        let listed = app.state.room_chat.list_rooms(&identity("acme", "bob")).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(app
            .state
            .room_chat
            .list_rooms(&identity("acme", "carol"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn messages_keep_send_order() {
        let app = TestApp::new();
        let alice = identity("acme", "alice");
        let bob = identity("acme", "bob");
        let room = app
            .state
            .room_chat
            .create_room(&alice, "Dock crew", &members(&["bob"]))
            .await
            .unwrap();

        for (who, body) in [(&alice, "one"), (&bob, "two"), (&alice, "three")] {
            app.state.room_chat.send_message(who, room.id, text(body)).await.unwrap();
        }
        let log: Vec<String> = app
            .state
            .room_chat
            .messages(&bob, room.id)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.text)
            .collect();
        assert_eq!(log, ["one", "two", "three"]);
    }

    #[tokio::test]
    async fn outsiders_cannot_send() {
        let app = TestApp::new();
        let alice = identity("acme", "alice");
        let room = app
            .state
            .room_chat
            .create_room(&alice, "Dock crew", &[])
            .await
            .unwrap();

        let err = app
            .state
            .room_chat
            .send_message(&identity("acme", "mallory"), room.id, text("hi"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "SENDER_NOT_IN_ROOM");

        let err = app
            .state
            .room_chat
            .send_message(&identity("globex", "alice"), room.id, text("hi"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ROOM_NOT_FOUND");
    }

    #[tokio::test]
    async fn members_in_the_room_see_message_and_delivery() {
        let app = TestApp::new();
        let alice = identity("acme", "alice");
        let bob = identity("acme", "bob");
        let room = app
            .state
            .room_chat
            .create_room(&alice, "Dock crew", &members(&["bob", "carol"]))
            .await
            .unwrap();
        let (alice_conn, mut alice_rx) = connect(&app, alice.clone()).await;
        let (bob_conn, mut bob_rx) = connect(&app, bob.clone()).await;
        app.state.room_chat.join(&alice, alice_conn, &room.id).await.unwrap();
        app.state.room_chat.join(&bob, bob_conn, &room.id).await.unwrap();

        let sent = app
            .state
            .room_chat
            .send_message(
                &alice,
                room.id,
                RoomOutgoing {
                    text: "shift starts at 6".into(),
                    temp_id: Some("c-1".into()),
                },
            )
            .await
            .unwrap();

        let alice_events = drain_events(&mut alice_rx);
        assert!(matches!(
            &alice_events[0],
            ServerEvent::RoomMessageReceived { temp_id: Some(t), message, .. } if t == "c-1" && message.id == sent.id
        ));
        assert!(matches!(
            &alice_events[1],
            ServerEvent::RoomMessageDelivered { delivered_to, .. } if delivered_to == &vec!["bob".to_string()]
        ));
        assert!(drain_events(&mut bob_rx)
            .iter()
            .any(|e| matches!(e, ServerEvent::Notification(n) if n.kind == NotificationType::RoomChat)));

        // carol was offline, her notification waits in the queue
        let carol = identity("acme", "carol");
        let (_carol_conn, mut carol_rx) = connect(&app, carol).await;
        assert!(drain_events(&mut carol_rx)
            .iter()
            .any(|e| matches!(e, ServerEvent::Notification(_))));
    }

    #[tokio::test]
    async fn only_the_sender_can_edit_or_delete() {
        let app = TestApp::new();
        let alice = identity("acme", "alice");
        let bob = identity("acme", "bob");
        let room = app
            .state
            .room_chat
            .create_room(&alice, "Dock crew", &members(&["bob"]))
            .await
            .unwrap();
        let sent = app
            .state
            .room_chat
            .send_message(&alice, room.id, text("draft"))
            .await
            .unwrap();

        let err = app
            .state
            .room_chat
            .edit_message(&bob, room.id, sent.id, "nope")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_ALLOWED_TO_EDIT_THIS_MESSAGE");
        let err = app
            .state
            .room_chat
            .delete_message(&bob, room.id, sent.id)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_ALLOWED_TO_DELETE_THIS_MESSAGE");

        let log = app.state.room_chat.messages(&alice, room.id).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].id, sent.id);
        assert_eq!(log[0].text, "draft");
        assert!(!log[0].edited);
        assert!(log[0].edited_at.is_none());

        let edited = app
            .state
            .room_chat
            .edit_message(&alice, room.id, sent.id, "final")
            .await
            .unwrap();
        assert!(edited.edited);
        assert!(edited.edited_at.is_some());

        app.state.room_chat.delete_message(&alice, room.id, sent.id).await.unwrap();
        assert!(app.state.room_chat.messages(&alice, room.id).await.unwrap().is_empty());
        let err = app
            .state
            .room_chat
            .delete_message(&alice, room.id, sent.id)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "MESSAGE_NOT_FOUND");
    }

    #[tokio::test]
    async fn same_tenant_outsiders_are_refused_edit_and_delete() {
        let app = TestApp::new();
        let alice = identity("acme", "alice");
        let room = app
            .state
            .room_chat
            .create_room(&alice, "Dock crew", &[])
            .await
            .unwrap();
        let sent = app
            .state
            .room_chat
            .send_message(&alice, room.id, text("draft"))
            .await
            .unwrap();

        let mallory = identity("acme", "mallory");
        let err = app
            .state
            .room_chat
            .edit_message(&mallory, room.id, sent.id, "nope")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_ALLOWED_TO_EDIT_THIS_MESSAGE");
        let err = app
            .state
            .room_chat
            .delete_message(&mallory, room.id, sent.id)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_ALLOWED_TO_DELETE_THIS_MESSAGE");
        let err = app
            .state
            .room_chat
            .edit_message(&mallory, room.id, Uuid::new_v4(), "nope")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "MESSAGE_NOT_FOUND");

        // other tenants still cannot see the room at all
        let err = app
            .state
            .room_chat
            .delete_message(&identity("globex", "alice"), room.id, sent.id)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ROOM_NOT_FOUND");

        let log = app.state.room_chat.messages(&alice, room.id).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].text, "draft");
        assert!(!log[0].edited);
    }

    #[tokio::test]
    async fn soft_deleted_room_disappears_even_for_its_creator() {
        let app = TestApp::new();
        let alice = identity("acme", "alice");
        let bob = identity("acme", "bob");
        let room = app
            .state
            .room_chat
            .create_room(&alice, "Dock crew", &members(&["bob"]))
            .await
            .unwrap();
        let (bob_conn, mut bob_rx) = connect(&app, bob.clone()).await;
        app.state.room_chat.join(&bob, bob_conn, &room.id).await.unwrap();

        let err = app.state.room_chat.delete_room(&bob, room.id).await.unwrap_err();
        assert_eq!(err.code(), "ONLY_CREATOR_CAN_DELETE_ROOM");

        app.state.room_chat.delete_room(&alice, room.id).await.unwrap();
        assert!(drain_events(&mut bob_rx)
            .iter()
            .any(|e| matches!(e, ServerEvent::RoomDeleted { room_id } if *room_id == room.id)));

        let err = app.state.room_chat.get_room(&alice, room.id).await.unwrap_err();
        assert_eq!(err.code(), "ROOM_NOT_FOUND");
        assert!(app.state.room_chat.list_rooms(&alice).await.unwrap().is_empty());
        let err = app
            .state
            .room_chat
            .send_message(&alice, room.id, text("hello?"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ROOM_NOT_FOUND");
    }

    #[tokio::test]
    async fn clearing_is_for_creator_or_admin() {
        let app = TestApp::new();
        let alice = identity("acme", "alice");
        let bob = identity("acme", "bob");
        let room = app
            .state
            .room_chat
            .create_room(&alice, "Dock crew", &members(&["bob", "boss"]))
            .await
            .unwrap();
        app.state.room_chat.send_message(&bob, room.id, text("a")).await.unwrap();

        let err = app
            .state
            .room_chat
            .delete_all_messages(&bob, room.id)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_ALLOWED_TO_CLEAR_ROOM");

        let cleared = app
            .state
            .room_chat
            .delete_all_messages(&admin("acme", "boss"), room.id)
            .await
            .unwrap();
        assert_eq!(cleared, 1);
        assert!(app.state.room_chat.messages(&alice, room.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_members_cannot_join_or_read() {
        let app = TestApp::new();
        let alice = identity("acme", "alice");
        let room = app
            .state
            .room_chat
            .create_room(&alice, "Dock crew", &[])
            .await
            .unwrap();
        let mallory = identity("acme", "mallory");
        let (conn, _rx) = connect(&app, mallory.clone()).await;

        let err = app.state.room_chat.join(&mallory, conn, &room.id).await.unwrap_err();
        assert_eq!(err.code(), "ROOM_NOT_FOUND");
        assert!(!app
            .state
            .websocket_manager
            .is_member(conn, &Group::room(&mallory.tenant_id, room.id)));
    }

    #[tokio::test]
    async fn mark_read_broadcasts_and_stores_timestamp() {
        let app = TestApp::new();
        let alice = identity("acme", "alice");
        let bob = identity("acme", "bob");
        let room = app
            .state
            .room_chat
            .create_room(&alice, "Dock crew", &members(&["bob"]))
            .await
            .unwrap();
        let (alice_conn, mut alice_rx) = connect(&app, alice.clone()).await;
        app.state.room_chat.join(&alice, alice_conn, &room.id).await.unwrap();

        app.state.room_chat.mark_read(&bob, &room.id).await.unwrap();

        assert!(drain_events(&mut alice_rx)
            .iter()
            .any(|e| matches!(e, ServerEvent::RoomMessageRead { user_id, .. } if user_id == "bob")));
        assert!(app
            .state
            .presence
            .room_read_at(&bob.tenant_id, room.id, "bob")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn concurrent_sends_all_land() {
        let app = TestApp::new();
        let alice = identity("acme", "alice");
        let bob = identity("acme", "bob");
        let room = app
            .state
            .room_chat
            .create_room(&alice, "Dock crew", &members(&["bob"]))
            .await
            .unwrap();

        let room_id = room.id;
        let mut handles = Vec::new();
        for (who, n) in [(alice.clone(), 0), (bob.clone(), 1), (alice.clone(), 2), (bob.clone(), 3)] {
            let channel = app.state.room_chat.clone();
            handles.push(tokio::spawn(async move {
                channel.send_message(&who, room_id, text(&format!("m{n}"))).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(app.state.room_chat.messages(&alice, room.id).await.unwrap().len(), 4);
        assert_eq!(app.state.room_chat.locks.len(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn broadcast_order_matches_log_order() {
        let app = TestApp::new();
        let crew = ["alice", "bob", "carol", "dave"];
        let alice = identity("acme", "alice");
        let room = app
            .state
            .room_chat
            .create_room(&alice, "Dock crew", &members(&crew))
            .await
            .unwrap();
        let (conn, mut rx) = connect(&app, alice.clone()).await;
        app.state.room_chat.join(&alice, conn, &room.id).await.unwrap();

        let room_id = room.id;
        let mut handles = Vec::new();
        for who in crew {
            let channel = app.state.room_chat.clone();
            handles.push(tokio::spawn(async move {
                let sender = identity("acme", who);
                for n in 0..5 {
                    channel
                        .send_message(&sender, room_id, text(&format!("{who}-{n}")))
                        .await
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let broadcast: Vec<Uuid> = drain_events(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                ServerEvent::RoomMessageReceived { message, .. } => Some(message.id),
                _ => None,
            })
            .collect();
        let log: Vec<Uuid> = app
            .state
            .room_chat
            .messages(&alice, room.id)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(log.len(), 20);
        assert_eq!(broadcast, log);
    }
}
