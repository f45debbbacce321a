//! Chat model clients.
//!
//! One trait fronts every provider. Models whose name starts with `claude` talk
//! to the Anthropic Messages API; everything else is treated as an
//! OpenAI-compatible `chat/completions` endpoint (OpenAI, Ollama, vLLM, ...).

pub mod anthropic;
pub mod openai;
pub mod sse;

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::config::models::ModelDefinition;
use crate::errors::AppError;
use crate::models::chat_message::Message;

pub use anthropic::AnthropicChatModel;
pub use openai::OpenAiChatModel;

/// Stream of content deltas produced by a model.
pub type TextStream = BoxStream<'static, Result<String, AppError>>;

/// Everything a provider needs to produce one reply.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system: String,
    /// Prior turns followed by the new user message, oldest first.
    pub messages: Vec<Message>,
    pub temperature: f64,
}

/// Unified chat interface over provider APIs.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Request a complete reply.
    async fn call(&self, request: &ChatRequest) -> Result<String, AppError>;

    /// Request a reply as a stream of content deltas.
    async fn stream(&self, request: &ChatRequest) -> Result<TextStream, AppError>;

    /// Provider-side model name, for logging.
    fn model_name(&self) -> &str;

    /// Provider name, for logging.
    fn provider_name(&self) -> &str;
}

/// What a single streamed provider event contributes.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamDelta {
    Text(String),
    Skip,
    Done,
}

const CLAUDE_PREFIX: &str = "claude";

/// Whether a model name is served by the Anthropic API.
pub fn is_claude_model(name: &str) -> bool {
    name.get(..CLAUDE_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(CLAUDE_PREFIX))
}

/// Build the client for one configured model.
pub fn build_chat_model(definition: &ModelDefinition, http: reqwest::Client) -> Arc<dyn ChatModel> {
    if is_claude_model(&definition.name) {
        Arc::new(AnthropicChatModel::new(
            http,
            &definition.base_url,
            &definition.api_key,
            &definition.name,
        ))
    } else {
        Arc::new(OpenAiChatModel::new(
            http,
            &definition.base_url,
            &definition.api_key,
            &definition.name,
        ))
    }
}

/// Turn a non-success response into an upstream error, keeping the body for logs.
pub(crate) async fn error_for_status(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, AppError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    tracing::error!(provider, %status, body = %body, "LLM request failed");
    Err(AppError::Upstream(format!("{provider} API error {status}: {body}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::models::ModelProperties;

    fn definition(name: &str) -> ModelDefinition {
        ModelDefinition {
            name: name.to_string(),
            display_name: name.to_string(),
            alias: name.to_string(),
            base_url: String::new(),
            api_key: "key".to_string(),
            properties: ModelProperties::default(),
        }
    }

    #[test]
    fn claude_prefix_is_case_insensitive() {
        assert!(is_claude_model("claude-sonnet-4"));
        assert!(is_claude_model("Claude-3-Opus"));
        assert!(!is_claude_model("gpt-4o"));
        assert!(!is_claude_model("cla"));
        assert!(!is_claude_model("my-claude"));
    }

    #[test]
    fn factory_picks_provider_by_name() {
        let http = reqwest::Client::new();
        let claude = build_chat_model(&definition("claude-3-haiku"), http.clone());
        assert_eq!(claude.provider_name(), "Anthropic");
        assert_eq!(claude.model_name(), "claude-3-haiku");

        let gpt = build_chat_model(&definition("llama3"), http);
        assert_eq!(gpt.provider_name(), "OpenAI");
    }
}
