use std::sync::Arc;

use crate::config::Config;
use crate::services::{
    notifications::NotificationService, presence::PresenceTracker, rate_limiter::RateLimiter,
    room_chat::RoomChatChannel, task_chat::TaskChatChannel,
};
use crate::store::Stores;
use crate::utils::jwt::JwtVerifier;
use crate::websocket::manager::WebSocketManager;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub jwt: JwtVerifier,
    pub websocket_manager: WebSocketManager,
    pub presence: PresenceTracker,
    pub notifications: NotificationService,
    pub task_chat: TaskChatChannel,
    pub room_chat: RoomChatChannel,
    pub message_limiter: RateLimiter,
    pub room_limiter: RateLimiter,
}

impl AppState {
    /// Wires every service over the given backends.
    pub fn new(config: Config, stores: Stores) -> Self {
        let websocket_manager = WebSocketManager::new();
        let presence = PresenceTracker::new(stores.keys.clone(), config.typing_ttl);
        let notifications = NotificationService::new(
            stores.notifications.clone(),
            stores.keys.clone(),
            websocket_manager.clone(),
            config.notification_ttl,
        );
        let message_limiter = RateLimiter::new("message", config.message_rate);
        let room_limiter = RateLimiter::new("room", config.room_rate);

        let task_chat = TaskChatChannel::new(
            stores.messages.clone(),
            websocket_manager.clone(),
            presence.clone(),
            message_limiter.clone(),
            notifications.clone(),
            config.max_message_length,
        );
        let room_chat = RoomChatChannel::new(
            stores.rooms.clone(),
            websocket_manager.clone(),
            presence.clone(),
            room_limiter.clone(),
            notifications.clone(),
            config.max_message_length,
        );

        Self {
            jwt: JwtVerifier::new(&config.jwt_secret),
            config: Arc::new(config),
            websocket_manager,
            presence,
            notifications,
            task_chat,
            room_chat,
            message_limiter,
            room_limiter,
        }
    }
}
