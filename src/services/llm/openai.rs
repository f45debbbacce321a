//! OpenAI-compatible chat completions client.

use async_trait::async_trait;
use futures::future;
use futures::stream::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{error_for_status, sse, ChatModel, ChatRequest, StreamDelta, TextStream};
use crate::errors::AppError;
use crate::models::chat_message::Role;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const PROVIDER: &str = "OpenAI";

#[derive(Clone)]
pub struct OpenAiChatModel {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiChatModel {
    pub fn new(client: reqwest::Client, base_url: &str, api_key: &str, model: &str) -> Self {
        let base = if base_url.trim().is_empty() {
            DEFAULT_BASE_URL
        } else {
            base_url.trim().trim_end_matches('/')
        };
        Self {
            client,
            endpoint: format!("{base}/v1/chat/completions"),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    async fn send(&self, request: &ChatRequest, stream: bool) -> Result<reqwest::Response, AppError> {
        let mut builder = self
            .client
            .post(&self.endpoint)
            .json(&request_body(&self.model, request, stream));
        if !self.api_key.is_empty() {
            builder = builder.bearer_auth(&self.api_key);
        }
        let response = builder.send().await?;
        error_for_status(PROVIDER, response).await
    }
}

fn role_name(role: Role) -> &'static str {
    match role.for_replay() {
        Role::User => "user",
        Role::Assistant => "assistant",
        _ => "system",
    }
}

/// Build the `chat/completions` payload.
pub fn request_body(model: &str, request: &ChatRequest, stream: bool) -> Value {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    if !request.system.trim().is_empty() {
        messages.push(json!({"role": "system", "content": request.system}));
    }
    for m in &request.messages {
        messages.push(json!({"role": role_name(m.role), "content": m.content}));
    }

    let mut body = json!({
        "model": model,
        "messages": messages,
        "temperature": request.temperature,
        "stream": stream,
    });
    if stream {
        body["stream_options"] = json!({"include_usage": true});
    }
    body
}

/// Interpret one `data:` payload of a streamed completion.
pub fn parse_stream_data(data: &str) -> Result<StreamDelta, AppError> {
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(StreamDelta::Done);
    }

    #[derive(Deserialize)]
    struct Delta {
        content: Option<String>,
    }
    #[derive(Deserialize)]
    struct Choice {
        delta: Option<Delta>,
    }
    #[derive(Deserialize)]
    struct ErrorBody {
        message: String,
    }
    #[derive(Deserialize)]
    struct Chunk {
        #[serde(default)]
        choices: Vec<Choice>,
        error: Option<ErrorBody>,
    }

    let chunk: Chunk = serde_json::from_str(data)
        .map_err(|e| AppError::Upstream(format!("Malformed {PROVIDER} stream chunk: {e}")))?;
    if let Some(err) = chunk.error {
        return Err(AppError::Upstream(err.message));
    }

    match chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta)
        .and_then(|d| d.content)
    {
        Some(text) if !text.is_empty() => Ok(StreamDelta::Text(text)),
        _ => Ok(StreamDelta::Skip),
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn call(&self, request: &ChatRequest) -> Result<String, AppError> {
        let response = self.send(request, false).await?;

        #[derive(Deserialize)]
        struct Message {
            content: Option<String>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: Message,
        }
        #[derive(Deserialize)]
        struct ApiResponse {
            choices: Vec<Choice>,
        }

        let api_response: ApiResponse = response.json().await?;
        api_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
            .ok_or_else(|| AppError::Upstream(format!("{PROVIDER} returned no choices")))
    }

    async fn stream(&self, request: &ChatRequest) -> Result<TextStream, AppError> {
        let response = self.send(request, true).await?;

        let deltas = sse::events(response)
            .map(|event| event.and_then(|e| parse_stream_data(&e.data)))
            .take_while(|delta| future::ready(!matches!(delta, Ok(StreamDelta::Done))))
            .filter_map(|delta| {
                future::ready(match delta {
                    Ok(StreamDelta::Text(text)) => Some(Ok(text)),
                    Ok(_) => None,
                    Err(e) => Some(Err(e)),
                })
            });
        Ok(deltas.boxed())
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &str {
        PROVIDER
    }
}
