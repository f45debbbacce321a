pub mod models;

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub host: String,
    pub port: u16,
    /// Folder holding `models.yaml` and `prompts/<model>.md`.
    pub config_path: PathBuf,
    pub chat: ChatConfig,
    pub rag: RagConfig,
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// History limit in messages.
    pub history_limit: i64,
}

#[derive(Debug, Clone)]
pub struct RagConfig {
    /// Share of the retrieved text (in percent) to place in the prompt.
    pub percentage: u32,
    pub top_k: i64,
}

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub dimensions: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self { history_limit: 20 }
    }
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            percentage: 30,
            top_k: 100,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            api_key: String::new(),
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, env::VarError> {
        let chat_defaults = ChatConfig::default();
        let rag_defaults = RagConfig::default();
        let embedding_defaults = EmbeddingConfig::default();

        Ok(Self {
            database_url: env::var("DATABASE_URL")?,
            database_max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 10),
            host: env::var("BACKEND_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_or("BACKEND_PORT", 3000),
            config_path: env::var("APP_CONFIG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./config")),
            chat: ChatConfig {
                history_limit: parse_or("CHAT_HISTORY_LIMIT", chat_defaults.history_limit),
            },
            rag: RagConfig {
                percentage: parse_or("RAG_PERCENTAGE", rag_defaults.percentage),
                top_k: parse_or("RAG_TOP_K", rag_defaults.top_k),
            },
            embedding: EmbeddingConfig {
                base_url: env::var("EMBEDDING_BASE_URL").unwrap_or(embedding_defaults.base_url),
                api_key: env::var("EMBEDDING_API_KEY").unwrap_or(embedding_defaults.api_key),
                model: env::var("EMBEDDING_MODEL").unwrap_or(embedding_defaults.model),
                dimensions: parse_or("EMBEDDING_DIMENSIONS", embedding_defaults.dimensions),
            },
        })
    }
}

/// Read a numeric variable, falling back to `default` when unset or unparsable.
fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        assert_eq!(ChatConfig::default().history_limit, 20);
        let rag = RagConfig::default();
        assert_eq!(rag.percentage, 30);
        assert_eq!(rag.top_k, 100);
        assert_eq!(EmbeddingConfig::default().dimensions, 1536);
    }

    #[test]
    fn parse_or_falls_back_on_garbage() {
        env::set_var("AGENT_TEST_PARSE_OR_GARBAGE", "not-a-number");
        assert_eq!(parse_or("AGENT_TEST_PARSE_OR_GARBAGE", 7u32), 7);
        env::set_var("AGENT_TEST_PARSE_OR_VALID", " 42 ");
        assert_eq!(parse_or("AGENT_TEST_PARSE_OR_VALID", 7u32), 42);
        assert_eq!(parse_or("AGENT_TEST_PARSE_OR_MISSING", 9i64), 9);
    }
}
