pub mod notifications;
pub mod room_chat;
pub mod task_chat;
