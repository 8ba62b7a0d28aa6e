use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{ChatError, ChatResult};
use crate::models::identity::Identity;
use crate::models::websocket::ServerEvent;
use crate::services::presence::PresenceTracker;
use crate::store::keys::ChatScope;
use crate::websocket::manager::{ConnectionId, Group, WebSocketManager};

/// Behaviour shared by task chat and room chat. Implementations bring their
/// own persistence; typing goes through the shared presence tracker.
#[async_trait]
pub trait Conversation: Send + Sync {
    /// Identifies one conversation (a task id or a room id).
    type Key: Send + Sync;
    /// What a client supplies to send a message.
    type Outgoing: Send;
    /// Persisted message shape.
    type Record: Send;

    fn hub(&self) -> &WebSocketManager;

    fn presence(&self) -> &PresenceTracker;

    fn scope(&self, key: &Self::Key) -> ChatScope;

    fn typing_event(&self, caller: &Identity, key: &Self::Key) -> ServerEvent;

    /// Rejects callers that may not see the conversation.
    async fn authorize(&self, caller: &Identity, key: &Self::Key) -> ChatResult<()>;

    /// Adds the connection to the conversation's group and returns its history.
    async fn join(
        &self,
        caller: &Identity,
        connection: ConnectionId,
        key: &Self::Key,
    ) -> ChatResult<Vec<Self::Record>>;

    async fn send(
        &self,
        caller: &Identity,
        key: &Self::Key,
        outgoing: Self::Outgoing,
    ) -> ChatResult<Self::Record>;

    async fn edit(
        &self,
        caller: &Identity,
        key: &Self::Key,
        message_id: Uuid,
        new_text: &str,
    ) -> ChatResult<Self::Record>;

    async fn mark_read(&self, caller: &Identity, key: &Self::Key) -> ChatResult<()>;

    fn group(&self, caller: &Identity, key: &Self::Key) -> Group {
        Group::Chat(caller.tenant_id.clone(), self.scope(key))
    }

    /// Sets the caller's short-lived typing marker and tells everyone else
    /// in the conversation. Nothing is persisted.
    async fn typing(&self, caller: &Identity, key: &Self::Key) -> ChatResult<()> {
        self.authorize(caller, key).await?;
        self.presence().set_typing(caller, &self.scope(key)).await?;
        self.hub().broadcast(
            &self.group(caller, key),
            self.typing_event(caller, key),
            Some(&caller.user_id),
        );
        Ok(())
    }

    fn leave(&self, caller: &Identity, connection: ConnectionId, key: &Self::Key) {
        self.hub().leave(connection, &self.group(caller, key));
    }
}

/// Trims `text` and checks it against the length ceiling (in chars).
pub fn validate_text(text: &str, max_chars: usize) -> ChatResult<String> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ChatError::MessageEmpty);
    }
    if text.chars().count() > max_chars {
        return Err(ChatError::MessageTooLong);
    }
    Ok(text.to_string())
}
