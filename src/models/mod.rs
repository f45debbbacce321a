//! Database models and DTOs for all domain entities.

pub mod chat_message;
pub mod conversation;
pub mod document;
pub mod model_info;
pub mod pagination;
pub mod space;
