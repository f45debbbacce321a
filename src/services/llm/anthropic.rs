//! Anthropic Messages API client.

use async_trait::async_trait;
use futures::future;
use futures::stream::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{error_for_status, sse, ChatModel, ChatRequest, StreamDelta, TextStream};
use crate::errors::AppError;
use crate::models::chat_message::Role;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 32_000;
const PROVIDER: &str = "Anthropic";

#[derive(Clone)]
pub struct AnthropicChatModel {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl AnthropicChatModel {
    pub fn new(client: reqwest::Client, base_url: &str, api_key: &str, model: &str) -> Self {
        let base = if base_url.trim().is_empty() {
            DEFAULT_BASE_URL
        } else {
            base_url.trim().trim_end_matches('/')
        };
        Self {
            client,
            endpoint: format!("{base}/v1/messages"),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    async fn send(&self, request: &ChatRequest, stream: bool) -> Result<reqwest::Response, AppError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request_body(&self.model, request, stream))
            .send()
            .await?;
        error_for_status(PROVIDER, response).await
    }
}

/// Build the Messages API payload.
///
/// The API only accepts user and assistant turns, so stored system and tool
/// messages are folded into the top-level system prompt.
pub fn request_body(model: &str, request: &ChatRequest, stream: bool) -> Value {
    let mut system = request.system.clone();
    let mut messages = Vec::with_capacity(request.messages.len());

    for m in &request.messages {
        match m.role {
            Role::User => messages.push(json!({"role": "user", "content": m.content})),
            Role::Assistant => messages.push(json!({"role": "assistant", "content": m.content})),
            Role::System | Role::Tool => {
                if !system.is_empty() {
                    system.push_str("\n\n");
                }
                system.push_str(&m.content);
            }
        }
    }

    let mut body = json!({
        "model": model,
        "max_tokens": MAX_TOKENS,
        "temperature": request.temperature,
        "messages": messages,
        "stream": stream,
    });
    if !system.trim().is_empty() {
        body["system"] = Value::String(system);
    }
    body
}

/// Interpret one streamed event payload.
pub fn parse_stream_data(data: &str) -> Result<StreamDelta, AppError> {
    #[derive(Deserialize)]
    struct Delta {
        #[serde(rename = "type")]
        kind: Option<String>,
        text: Option<String>,
    }
    #[derive(Deserialize)]
    struct ErrorBody {
        message: String,
    }
    #[derive(Deserialize)]
    struct Event {
        #[serde(rename = "type")]
        kind: String,
        delta: Option<Delta>,
        error: Option<ErrorBody>,
    }

    let event: Event = serde_json::from_str(data)
        .map_err(|e| AppError::Upstream(format!("Malformed {PROVIDER} stream event: {e}")))?;

    match event.kind.as_str() {
        "content_block_delta" => match event.delta {
            Some(Delta {
                kind: Some(kind),
                text: Some(text),
            }) if kind == "text_delta" && !text.is_empty() => Ok(StreamDelta::Text(text)),
            _ => Ok(StreamDelta::Skip),
        },
        "message_stop" => Ok(StreamDelta::Done),
        "error" => Err(AppError::Upstream(
            event
                .error
                .map(|e| e.message)
                .unwrap_or_else(|| format!("{PROVIDER} stream error")),
        )),
        _ => Ok(StreamDelta::Skip),
    }
}

#[async_trait]
impl ChatModel for AnthropicChatModel {
    async fn call(&self, request: &ChatRequest) -> Result<String, AppError> {
        let response = self.send(request, false).await?;

        #[derive(Deserialize)]
        struct ContentBlock {
            text: Option<String>,
        }
        #[derive(Deserialize)]
        struct ApiResponse {
            content: Vec<ContentBlock>,
        }

        let api_response: ApiResponse = response.json().await?;
        let text: String = api_response
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect();
        if text.is_empty() {
            return Err(AppError::Upstream(format!("Empty response from {PROVIDER}")));
        }
        Ok(text)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat_message::Message;

    #[test]
    fn endpoint_defaults_to_public_api() {
        let m = AnthropicChatModel::new(reqwest::Client::new(), " ", "k", "claude-3-haiku");
        assert_eq!(m.endpoint, "https://api.anthropic.com/v1/messages");
    }

    #[test]
    fn body_folds_system_turns_into_system_prompt() {
        let rq = ChatRequest {
            system: "Base prompt".to_string(),
            messages: vec![
                Message::system("Earlier note"),
                Message::user("Hi"),
                Message::assistant("Hello"),
                Message::user("Again"),
            ],
            temperature: 1.0,
        };
        let body = request_body("claude-3-haiku", &rq, true);
        assert_eq!(body["system"], "Base prompt\n\nEarlier note");
        assert_eq!(body["max_tokens"], 32_000);
        assert_eq!(body["stream"], true);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[1]["role"], "assistant");
    }

    #[test]
    fn body_without_system_prompt_omits_field() {
        let rq = ChatRequest {
            system: String::new(),
            messages: vec![Message::user("Hi")],
            temperature: 0.0,
        };
        assert!(request_body("claude", &rq, false).get("system").is_none());
    }

    #[test]
    fn parses_stream_events() {
        let delta = r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}}"#;
        assert_eq!(parse_stream_data(delta).unwrap(), StreamDelta::Text("Hi".into()));

        let start = r#"{"type":"message_start","message":{"id":"msg_1"}}"#;
        assert_eq!(parse_stream_data(start).unwrap(), StreamDelta::Skip);

        let ping = r#"{"type":"ping"}"#;
        assert_eq!(parse_stream_data(ping).unwrap(), StreamDelta::Skip);

        let stop = r#"{"type":"message_stop"}"#;
        assert_eq!(parse_stream_data(stop).unwrap(), StreamDelta::Done);
    }

    #[test]
    fn error_event_is_upstream_error() {
        let err = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        assert!(matches!(
            parse_stream_data(err),
            Err(AppError::Upstream(msg)) if msg == "Overloaded"
        ));
    }
}
