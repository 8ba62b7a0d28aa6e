pub mod conversation;
pub mod locks;
pub mod notifications;
pub mod presence;
pub mod rate_limiter;
pub mod room_chat;
pub mod task_chat;
