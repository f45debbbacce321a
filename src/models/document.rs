//! Embedded document chunks stored in the vector table.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Metadata keys attached to every stored chunk.
pub mod meta {
    pub const SPACE: &str = "space";
    pub const DOC: &str = "doc";
    pub const CHUNK: &str = "chunk";
    pub const NUMBER: &str = "number";
    pub const TOTAL: &str = "total";
}

/// A stored chunk as returned by searches and listings.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RagDocument {
    /// Chunk id.
    pub id: Uuid,
    pub content: String,
    pub metadata: serde_json::Value,
    /// Cosine similarity to the query; absent for plain listings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl RagDocument {
    /// Copy with content cut to `max_chars` characters followed by an ellipsis.
    pub fn preview(mut self, max_chars: usize) -> Self {
        let cut: String = self.content.chars().take(max_chars).collect();
        self.content = format!("{cut}...");
        self
    }
}

/// Chunk ready to be written to the store.
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub id: Uuid,
    pub content: String,
    pub metadata: serde_json::Value,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddDocument {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentList {
    pub documents: Vec<RagDocument>,
}

/// Final event of a document ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestedDocument {
    pub doc_id: Uuid,
    pub chunks: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(content: &str) -> RagDocument {
        RagDocument {
            id: Uuid::nil(),
            content: content.to_string(),
            metadata: serde_json::json!({}),
            score: None,
        }
    }

    #[test]
    fn preview_truncates_by_characters() {
        let d = doc("héllo wörld").preview(5);
        assert_eq!(d.content, "héllo...");
    }

    #[test]
    fn preview_keeps_short_content() {
        let d = doc("short").preview(3000);
        assert_eq!(d.content, "short...");
    }

    #[test]
    fn listing_omits_score() {
        let json = serde_json::to_value(doc("x")).unwrap();
        assert!(json.get("score").is_none());
    }
}
