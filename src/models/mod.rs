pub mod analysis;
pub mod chat;
pub mod conversation;
pub mod dashboard;
