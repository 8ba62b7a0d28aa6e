pub mod handlers;
pub mod manager;
pub mod session;
