//! Text embeddings for the vector store.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::config::EmbeddingConfig;
use crate::errors::AppError;

/// Trait for text embedding services.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate embedding for text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AppError>;

    /// Batch embed multiple texts, preserving order.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, AppError>;

    fn model_name(&self) -> &str;

    fn dimension(&self) -> usize;
}

/// Shared embedder type for use across handlers.
pub type SharedEmbedder = Arc<dyn Embedder>;

/// OpenAI-compatible `/v1/embeddings` client.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    dimension: usize,
}

impl OpenAiEmbedder {
    pub fn new(client: reqwest::Client, config: &EmbeddingConfig) -> Self {
        Self {
            client,
            endpoint: format!("{}/v1/embeddings", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            dimension: config.dimensions,
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AppError> {
        self.embed_batch(&[text])
            .await?
            .pop()
            .ok_or_else(|| AppError::Upstream("Embedding provider returned no vectors".to_string()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, AppError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut request = self.client.post(&self.endpoint).json(&json!({
            "model": &self.model,
            "input": texts,
        }));
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, body = %body, "Embedding request failed");
            return Err(AppError::Upstream(format!("Embedding API error {status}: {body}")));
        }

        #[derive(Deserialize)]
        struct Item {
            index: usize,
            embedding: Vec<f32>,
        }
        #[derive(Deserialize)]
        struct ApiResponse {
            data: Vec<Item>,
        }

        let mut api_response: ApiResponse = response.json().await?;
        if api_response.data.len() != texts.len() {
            return Err(AppError::Upstream(format!(
                "Embedding provider returned {} vectors for {} inputs",
                api_response.data.len(),
                texts.len()
            )));
        }
        api_response.data.sort_by_key(|item| item.index);

        let vectors: Vec<Vec<f32>> = api_response.data.into_iter().map(|i| i.embedding).collect();
        if let Some(v) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(AppError::Upstream(format!(
                "Embedding dimension mismatch: expected {}, got {}",
                self.dimension,
                v.len()
            )));
        }
        Ok(vectors)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
