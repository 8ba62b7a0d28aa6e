pub mod key_values;
pub mod messages;
pub mod notifications;
pub mod rooms;
