//! Conversation (chat) model and its request/response DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::chat_message::MessageView;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Conversation {
    pub id: Uuid,
    pub title: String,
    /// Alias of the model last selected for this chat.
    pub model_name: Option<String>,
    /// Space whose documents are used as retrieval context.
    pub rag_space: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Summary DTO for list views.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChatSummary {
    pub id: Uuid,
    pub title: String,
    pub model_name: Option<String>,
    pub rag_space: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateChat {
    pub rag_space: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedChat {
    pub id: Uuid,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessage {
    /// Alias of the model to answer with.
    pub model_name: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateModel {
    pub model_alias: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatedModel {
    pub model_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatHistory {
    pub chat_id: Uuid,
    pub messages: Vec<MessageView>,
}
