//! Ephemeral 1:1 conversations attached to a task. The whole conversation is
//! hard-deleted when the task completes.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{ChatError, ChatResult};
use crate::models::identity::{Identity, TenantId};
use crate::models::messages::Message;
use crate::models::notifications::{preview, NotificationDraft, NotificationType};
use crate::models::websocket::ServerEvent;
use crate::services::conversation::{validate_text, Conversation};
use crate::services::locks::KeyedLocks;
use crate::services::notifications::NotificationService;
use crate::services::presence::PresenceTracker;
use crate::services::rate_limiter::RateLimiter;
use crate::store::{keys::ChatScope, MessageStore};
use crate::websocket::manager::{ConnectionId, Group, WebSocketManager};

#[derive(Debug, Clone)]
pub struct TaskOutgoing {
    pub receiver_id: String,
    pub text: String,
    pub temp_id: Option<String>,
}

#[derive(Clone)]
pub struct TaskChatChannel {
    messages: Arc<dyn MessageStore>,
    hub: WebSocketManager,
    presence: PresenceTracker,
    limiter: RateLimiter,
    notifications: NotificationService,
    max_text_len: usize,
    // one writer per conversation so fan-out follows insert order
    locks: KeyedLocks<(TenantId, String)>,
}

impl TaskChatChannel {
    pub fn new(
        messages: Arc<dyn MessageStore>,
        hub: WebSocketManager,
        presence: PresenceTracker,
        limiter: RateLimiter,
        notifications: NotificationService,
        max_text_len: usize,
    ) -> Self {
        Self {
            messages,
            hub,
            presence,
            limiter,
            notifications,
            max_text_len,
            locks: KeyedLocks::new(),
        }
    }

    pub async fn history(&self, caller: &Identity, task_id: &str) -> ChatResult<Vec<Message>> {
        self.messages.history(&caller.tenant_id, task_id).await
    }

    /// Edit when the client did not say which task the message belongs to.
    pub async fn edit_by_id(
        &self,
        caller: &Identity,
        message_id: Uuid,
        new_text: &str,
    ) -> ChatResult<Message> {
        let message = self
            .messages
            .find(&caller.tenant_id, message_id)
            .await?
            .ok_or(ChatError::MessageNotFound)?;
        self.edit(caller, &message.task_id, message_id, new_text).await
    }

    /// Deletes every message of a completed task, tells everyone who took
    /// part, and closes the task's group. Connections stay open.
    pub async fn close_task(&self, tenant: &TenantId, task_id: &str) -> ChatResult<u64> {
        let participants: HashSet<String> = self
            .messages
            .history(tenant, task_id)
            .await?
            .into_iter()
            .flat_map(|m| [m.sender_id, m.receiver_id])
            .collect();

        let deleted = self.messages.delete_for_task(tenant, task_id).await?;

        let group = Group::task(tenant, task_id);
        let event = ServerEvent::ChatAutoDeleted {
            task_id: task_id.to_string(),
        };
        let in_group = self.hub.users_in_group(&group);
        self.hub.broadcast(&group, event.clone(), None);
        for user in participants.difference(&in_group) {
            self.hub.send_to_user(tenant, user, event.clone());
        }
        self.hub.evict_group(&group);

        tracing::info!(tenant = %tenant, task = task_id, deleted, "task chat closed");
        Ok(deleted)
    }

    async fn notify_offline_receiver(&self, message: &Message) {
        let draft = NotificationDraft::new(
            message.receiver_id.clone(),
            NotificationType::Chat,
            preview(&format!("New message from {}", message.sender_name), 100),
            preview(&message.text, 500),
        );
        if let Err(e) = self.notifications.notify(&message.tenant_id, draft).await {
            tracing::warn!(error = %e, message = %message.id, "chat notification failed");
        }
    }
}

#[async_trait]
impl Conversation for TaskChatChannel {
    type Key = String;
    type Outgoing = TaskOutgoing;
    type Record = Message;

    fn hub(&self) -> &WebSocketManager {
        &self.hub
    }

    fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    fn scope(&self, task_id: &String) -> ChatScope {
        ChatScope::Task(task_id.clone())
    }

    fn typing_event(&self, caller: &Identity, task_id: &String) -> ServerEvent {
        ServerEvent::Typing {
            task_id: task_id.clone(),
            user_id: caller.user_id.clone(),
            user_name: caller.name.clone(),
        }
    }

    // Task membership is owned by the task module; tenant scoping is enforced
    // by the group and store keys.
    async fn authorize(&self, _caller: &Identity, task_id: &String) -> ChatResult<()> {
        if task_id.trim().is_empty() {
            return Err(ChatError::InvalidPayload("taskId is required".to_string()));
        }
        Ok(())
    }

    async fn join(
        &self,
        caller: &Identity,
        connection: ConnectionId,
        task_id: &String,
    ) -> ChatResult<Vec<Message>> {
        self.authorize(caller, task_id).await?;
        let group = self.group(caller, task_id);
        self.hub.join(connection, group.clone());

        let mut history = self.messages.history(&caller.tenant_id, task_id).await?;
        let pending = self
            .messages
            .undelivered_for(&caller.tenant_id, task_id, &caller.user_id)
            .await?;
        if !pending.is_empty() {
            self.messages
                .mark_delivered(&caller.tenant_id, &pending)
                .await?;
            for message in history.iter_mut().filter(|m| pending.contains(&m.id)) {
                message.delivered = true;
            }
            self.hub.broadcast(
                &group,
                ServerEvent::MessageDelivered {
                    task_id: task_id.clone(),
                    message_ids: pending,
                },
                None,
            );
        }
        Ok(history)
    }

    async fn send(
        &self,
        caller: &Identity,
        task_id: &String,
        outgoing: TaskOutgoing,
    ) -> ChatResult<Message> {
        self.authorize(caller, task_id).await?;
        let text = validate_text(&outgoing.text, self.max_text_len)?;
        let receiver_id = outgoing.receiver_id.trim();
        if receiver_id.is_empty() || receiver_id == caller.user_id {
            return Err(ChatError::InvalidPayload(
                "receiverId must name the other participant".to_string(),
            ));
        }
        self.limiter.check(&caller.scoped_key())?;

        let guard = self
            .locks
            .lock((caller.tenant_id.clone(), task_id.clone()))
            .await;
        let mut message = Message::new(caller, task_id, receiver_id, text);
        self.messages.insert(&message).await?;

        let group = self.group(caller, task_id);
        self.hub.broadcast(
            &group,
            ServerEvent::MessageReceived {
                message: message.clone(),
                temp_id: outgoing.temp_id,
            },
            None,
        );

        if !self.hub.user_in_group(&group, &message.receiver_id) {
            drop(guard);
            self.notify_offline_receiver(&message).await;
            return Ok(message);
        }
        match self
            .messages
            .mark_delivered(&caller.tenant_id, &[message.id])
            .await
        {
            Ok(()) => {
                message.delivered = true;
                self.hub.broadcast(
                    &group,
                    ServerEvent::MessageDelivered {
                        task_id: task_id.clone(),
                        message_ids: vec![message.id],
                    },
                    None,
                );
            }
            Err(e) => {
                tracing::warn!(error = %e, message = %message.id, "could not record delivery");
            }
        }

        Ok(message)
    }

    async fn edit(
        &self,
        caller: &Identity,
        task_id: &String,
        message_id: Uuid,
        new_text: &str,
    ) -> ChatResult<Message> {
        let text = validate_text(new_text, self.max_text_len)?;
        let existing = self
            .messages
            .find(&caller.tenant_id, message_id)
            .await?
            .filter(|m| &m.task_id == task_id)
            .ok_or(ChatError::MessageNotFound)?;
        if existing.sender_id != caller.user_id {
            return Err(ChatError::NotAllowedToEdit);
        }

        let updated = self
            .messages
            .update_text(&caller.tenant_id, message_id, &text)
            .await?
            .ok_or(ChatError::MessageNotFound)?;
        self.hub.broadcast(
            &self.group(caller, task_id),
            ServerEvent::MessageEdited {
                message: updated.clone(),
            },
            None,
        );
        Ok(updated)
    }

    async fn mark_read(&self, caller: &Identity, task_id: &String) -> ChatResult<()> {
        self.authorize(caller, task_id).await?;
        let newly_read = self
            .messages
            .mark_read(&caller.tenant_id, task_id, &caller.user_id)
            .await?;
        if newly_read.is_empty() {
            return Ok(());
        }
        self.hub.broadcast(
            &self.group(caller, task_id),
            ServerEvent::MessageSeen {
                task_id: task_id.clone(),
                reader_id: caller.user_id.clone(),
                message_ids: newly_read,
            },
            None,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::store::memory::MemoryMessageStore;
    use crate::testing::{connect, drain_events, identity, TestApp};

    /// Memory store whose insert of `slow_text` stalls for a while.
    struct StallingStore {
        inner: MemoryMessageStore,
        slow_text: &'static str,
    }

    #[async_trait]
    impl MessageStore for StallingStore {
        async fn insert(&self, message: &Message) -> ChatResult<()> {
            if message.text == self.slow_text {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            self.inner.insert(message).await
        }

        async fn history(&self, tenant: &TenantId, task_id: &str) -> ChatResult<Vec<Message>> {
            self.inner.history(tenant, task_id).await
        }

        async fn find(&self, tenant: &TenantId, message_id: Uuid) -> ChatResult<Option<Message>> {
            self.inner.find(tenant, message_id).await
        }

        async fn undelivered_for(
            &self,
            tenant: &TenantId,
            task_id: &str,
            receiver_id: &str,
        ) -> ChatResult<Vec<Uuid>> {
            self.inner.undelivered_for(tenant, task_id, receiver_id).await
        }

        async fn mark_delivered(&self, tenant: &TenantId, message_ids: &[Uuid]) -> ChatResult<()> {
            self.inner.mark_delivered(tenant, message_ids).await
        }

        async fn mark_read(
            &self,
            tenant: &TenantId,
            task_id: &str,
            reader_id: &str,
        ) -> ChatResult<Vec<Uuid>> {
            self.inner.mark_read(tenant, task_id, reader_id).await
        }

        async fn update_text(
            &self,
            tenant: &TenantId,
            message_id: Uuid,
            text: &str,
        ) -> ChatResult<Option<Message>> {
            self.inner.update_text(tenant, message_id, text).await
        }

        async fn delete_for_task(&self, tenant: &TenantId, task_id: &str) -> ChatResult<u64> {
            self.inner.delete_for_task(tenant, task_id).await
        }
    }

    fn outgoing(receiver: &str, text: &str) -> TaskOutgoing {
        TaskOutgoing {
            receiver_id: receiver.to_string(),
            text: text.to_string(),
            temp_id: Some("tmp".to_string()),
        }
    }

    #[tokio::test]
    async fn sent_message_round_trips_through_history() {
        let app = TestApp::new();
        let alice = identity("acme", "alice");
        let task = "task-1".to_string();

        let sent = app
            .state
            .task_chat
            .send(&alice, &task, outgoing("bob", " hello bob "))
            .await
            .unwrap();
        let history = app.state.task_chat.history(&alice, &task).await.unwrap();

        assert_eq!(history.len(), 1);
        assert_eq!(history[0].text, "hello bob");
        assert_eq!(history[0].sender_id, sent.sender_id);
        assert_eq!(
            history[0].timestamp.timestamp_micros(),
            sent.timestamp.timestamp_micros()
        );
        assert!(!history[0].read);
    }

    #[tokio::test]
    async fn empty_text_is_rejected_without_writes() {
        let app = TestApp::new();
        let alice = identity("acme", "alice");
        let task = "task-1".to_string();
        let err = app
            .state
            .task_chat
            .send(&alice, &task, outgoing("bob", "   "))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "MESSAGE_EMPTY");
        assert!(app.state.task_chat.history(&alice, &task).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn receiver_present_in_group_gets_delivery_ack() {
        let app = TestApp::new();
        let alice = identity("acme", "alice");
        let bob = identity("acme", "bob");
        let task = "task-1".to_string();
        let (alice_conn, mut alice_rx) = connect(&app, alice.clone()).await;
        let (bob_conn, mut bob_rx) = connect(&app, bob.clone()).await;
        app.state.task_chat.join(&alice, alice_conn, &task).await.unwrap();
        app.state.task_chat.join(&bob, bob_conn, &task).await.unwrap();
        drain_events(&mut alice_rx);

        let sent = app
            .state
            .task_chat
            .send(&alice, &task, outgoing("bob", "ping"))
            .await
            .unwrap();
        assert!(sent.delivered);

        let events = drain_events(&mut alice_rx);
        assert!(matches!(events[0], ServerEvent::MessageReceived { .. }));
        assert!(matches!(
            &events[1],
            ServerEvent::MessageDelivered { message_ids, .. } if message_ids == &vec![sent.id]
        ));
        // bob is in the room, so no notification is created for him
        assert!(drain_events(&mut bob_rx)
            .iter()
            .all(|e| !matches!(e, ServerEvent::Notification(_))));
    }

    #[tokio::test]
    async fn absent_receiver_is_notified_and_gets_delivery_on_join() {
        let app = TestApp::new();
        let alice = identity("acme", "alice");
        let bob = identity("acme", "bob");
        let task = "task-1".to_string();

        let sent = app
            .state
            .task_chat
            .send(&alice, &task, outgoing("bob", "are you there?"))
            .await
            .unwrap();
        assert!(!sent.delivered);

        let (bob_conn, mut bob_rx) = connect(&app, bob.clone()).await;
        let history = app.state.task_chat.join(&bob, bob_conn, &task).await.unwrap();
        assert!(history[0].delivered);

        let events = drain_events(&mut bob_rx);
        assert!(events
            .iter()
            .any(|e| matches!(e, ServerEvent::Notification(n) if n.kind == NotificationType::Chat)));
        assert!(events.iter().any(
            |e| matches!(e, ServerEvent::MessageDelivered { message_ids, .. } if message_ids == &vec![sent.id])
        ));
    }

    #[tokio::test]
    async fn mark_read_is_idempotent() {
        let app = TestApp::new();
        let alice = identity("acme", "alice");
        let bob = identity("acme", "bob");
        let task = "task-1".to_string();
        let (alice_conn, mut alice_rx) = connect(&app, alice.clone()).await;
        app.state.task_chat.join(&alice, alice_conn, &task).await.unwrap();
        app.state
            .task_chat
            .send(&alice, &task, outgoing("bob", "one"))
            .await
            .unwrap();
        app.state
            .task_chat
            .send(&alice, &task, outgoing("bob", "two"))
            .await
            .unwrap();
        drain_events(&mut alice_rx);

        app.state.task_chat.mark_read(&bob, &task).await.unwrap();
        app.state.task_chat.mark_read(&bob, &task).await.unwrap();

        let seen: Vec<ServerEvent> = drain_events(&mut alice_rx)
            .into_iter()
            .filter(|e| matches!(e, ServerEvent::MessageSeen { .. }))
            .collect();
        assert_eq!(seen.len(), 1);
        assert!(matches!(&seen[0], ServerEvent::MessageSeen { message_ids, .. } if message_ids.len() == 2));
        let history = app.state.task_chat.history(&bob, &task).await.unwrap();
        assert!(history.iter().all(|m| m.read));
    }

    #[tokio::test]
    async fn only_the_sender_can_edit() {
        let app = TestApp::new();
        let alice = identity("acme", "alice");
        let bob = identity("acme", "bob");
        let task = "task-1".to_string();
        let sent = app
            .state
            .task_chat
            .send(&alice, &task, outgoing("bob", "draft"))
            .await
            .unwrap();

        let err = app
            .state
            .task_chat
            .edit(&bob, &task, sent.id, "hijacked")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_ALLOWED_TO_EDIT_THIS_MESSAGE");
        let err = app
            .state
            .task_chat
            .edit_by_id(&bob, sent.id, "hijacked")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_ALLOWED_TO_EDIT_THIS_MESSAGE");

        let history = app.state.task_chat.history(&alice, &task).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, sent.id);
        assert_eq!(history[0].text, "draft");
        assert!(!history[0].edited);

        let edited = app
            .state
            .task_chat
            .edit_by_id(&alice, sent.id, "final")
            .await
            .unwrap();
        assert!(edited.edited);
        let history = app.state.task_chat.history(&alice, &task).await.unwrap();
        assert_eq!(history[0].text, "final");
    }

    #[tokio::test]
    async fn slow_insert_does_not_reorder_the_broadcast() {
        let app = TestApp::new();
        let channel = TaskChatChannel::new(
            Arc::new(StallingStore {
                inner: MemoryMessageStore::default(),
                slow_text: "first",
            }),
            app.state.websocket_manager.clone(),
            app.state.presence.clone(),
            app.state.message_limiter.clone(),
            app.state.notifications.clone(),
            app.state.config.max_message_length,
        );
        let alice = identity("acme", "alice");
        let task = "task-1".to_string();
        let (conn, mut rx) = connect(&app, alice.clone()).await;
        channel.join(&alice, conn, &task).await.unwrap();

        let first = {
            let (channel, alice, task) = (channel.clone(), alice.clone(), task.clone());
            tokio::spawn(async move { channel.send(&alice, &task, outgoing("bob", "first")).await })
        };
        tokio::task::yield_now().await;
        let second = {
            let (channel, alice, task) = (channel.clone(), alice.clone(), task.clone());
            tokio::spawn(async move { channel.send(&alice, &task, outgoing("bob", "second")).await })
        };
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        let broadcast: Vec<String> = drain_events(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                ServerEvent::MessageReceived { message, .. } => Some(message.text),
                _ => None,
            })
            .collect();
        let history: Vec<String> = channel
            .history(&alice, &task)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.text)
            .collect();
        assert_eq!(history, ["first", "second"]);
        assert_eq!(broadcast, history);
        assert_eq!(channel.locks.len(), 0);
    }

    #[tokio::test]
    async fn edits_cannot_cross_tenants() {
        let app = TestApp::new();
        let alice = identity("acme", "alice");
        let sent = app
            .state
            .task_chat
            .send(&alice, &"task-1".to_string(), outgoing("bob", "secret"))
            .await
            .unwrap();

        let impostor = identity("globex", "alice");
        let err = app
            .state
            .task_chat
            .edit_by_id(&impostor, sent.id, "changed")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "MESSAGE_NOT_FOUND");
    }

    #[tokio::test(start_paused = true)]
    async fn eleventh_send_inside_the_window_is_rejected() {
        let app = TestApp::new();
        let alice = identity("acme", "alice");
        let task = "task-1".to_string();
        for i in 0..10 {
            app.state
                .task_chat
                .send(&alice, &task, outgoing("bob", &format!("m{i}")))
                .await
                .unwrap();
        }
        let err = app
            .state
            .task_chat
            .send(&alice, &task, outgoing("bob", "one too many"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "RATE_LIMIT_EXCEEDED");
        assert_eq!(app.state.task_chat.history(&alice, &task).await.unwrap().len(), 10);

        tokio::time::advance(std::time::Duration::from_secs(5)).await;
        assert!(app
            .state
            .task_chat
            .send(&alice, &task, outgoing("bob", "later"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn completing_a_task_deletes_its_chat() {
        let app = TestApp::new();
        let alice = identity("acme", "alice");
        let bob = identity("acme", "bob");
        let task = "task-1".to_string();
        let (alice_conn, mut alice_rx) = connect(&app, alice.clone()).await;
        let (_bob_conn, mut bob_rx) = connect(&app, bob.clone()).await;
        app.state.task_chat.join(&alice, alice_conn, &task).await.unwrap();

        for text in ["one", "two", "three"] {
            app.state
                .task_chat
                .send(&alice, &task, outgoing("bob", text))
                .await
                .unwrap();
        }
        let history = app.state.task_chat.history(&alice, &task).await.unwrap();
        assert_eq!(history.len(), 3);

        let deleted = app
            .state
            .task_chat
            .close_task(&alice.tenant_id, &task)
            .await
            .unwrap();
        assert_eq!(deleted, 3);
        assert!(app.state.task_chat.history(&alice, &task).await.unwrap().is_empty());

        for rx in [&mut alice_rx, &mut bob_rx] {
            let auto_deleted = drain_events(rx)
                .into_iter()
                .filter(|e| matches!(e, ServerEvent::ChatAutoDeleted { task_id } if task_id == "task-1"))
                .count();
            assert_eq!(auto_deleted, 1);
        }
        assert!(!app
            .state
            .websocket_manager
            .is_member(alice_conn, &Group::task(&alice.tenant_id, &task)));
    }

    #[tokio::test]
    async fn typing_reaches_others_but_not_the_typist() {
        let app = TestApp::new();
        let alice = identity("acme", "alice");
        let bob = identity("acme", "bob");
        let task = "task-1".to_string();
        let (alice_conn, mut alice_rx) = connect(&app, alice.clone()).await;
        let (bob_conn, mut bob_rx) = connect(&app, bob.clone()).await;
        app.state.task_chat.join(&alice, alice_conn, &task).await.unwrap();
        app.state.task_chat.join(&bob, bob_conn, &task).await.unwrap();
        drain_events(&mut alice_rx);
        drain_events(&mut bob_rx);

        app.state.task_chat.typing(&alice, &task).await.unwrap();

        assert!(drain_events(&mut alice_rx).is_empty());
        assert!(matches!(
            drain_events(&mut bob_rx).as_slice(),
            [ServerEvent::Typing { user_id, .. }] if user_id == "alice"
        ));
        assert!(app
            .state
            .presence
            .is_typing(&alice.tenant_id, &ChatScope::Task(task.clone()), "alice")
            .await
            .unwrap());
    }
}
