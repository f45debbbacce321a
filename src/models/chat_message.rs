//! Persisted chat message and the role taxonomy shared with LLM clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Assistant => "ASSISTANT",
            Self::System => "SYSTEM",
            Self::Tool => "TOOL",
        }
    }

    /// Parse a stored role name. Unknown names are treated as system text.
    pub fn from_stored(name: &str) -> Self {
        match name {
            "USER" => Self::User,
            "ASSISTANT" => Self::Assistant,
            "TOOL" => Self::Tool,
            _ => Self::System,
        }
    }

    /// Role used when replaying stored history to a model.
    ///
    /// Tool output is not re-sent as a tool turn; it becomes system context.
    pub fn for_replay(self) -> Self {
        match self {
            Self::Tool => Self::System,
            other => other,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChatMessageRow {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A message in a conversation, independent of storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

impl From<ChatMessageRow> for Message {
    fn from(row: ChatMessageRow) -> Self {
        Self {
            role: Role::from_stored(&row.role).for_replay(),
            content: row.content,
        }
    }
}

/// History entry as returned to API clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageView {
    pub role: String,
    pub content: String,
}

impl From<Message> for MessageView {
    fn from(m: Message) -> Self {
        Self {
            role: m.role.as_str().to_string(),
            content: m.content,
        }
    }
}
