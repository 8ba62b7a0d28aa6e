pub mod identity;
pub mod messages;
pub mod notifications;
pub mod rooms;
pub mod websocket;
