//! Embedding client abstraction and vector utilities.
//!
//! [`EmbeddingClient`] is the seam between the pipeline and whatever model
//! produces vectors. The provided [`OpenAiEmbedder`] talks to any
//! OpenAI-compatible `/embeddings` endpoint. Batch embedding defaults to
//! embedding each text concurrently; implementations with a native batch
//! endpoint can override it.

use async_trait::async_trait;
use futures::future::try_join_all;
use serde::Deserialize;
use serde_json::json;

use crate::config::EmbeddingConfig;
use crate::error::PipelineError;

/// A client that turns text into fixed-dimensionality vectors.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Identifier of the underlying model.
    fn model_name(&self) -> &str;

    /// Dimensionality every returned vector must have.
    fn dims(&self) -> usize;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError>;

    /// Embed a batch of texts, preserving input order.
    ///
    /// The default embeds each text concurrently and fails fast on the first
    /// error.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        try_join_all(texts.iter().map(|t| self.embed(t))).await
    }
}

/// Embedding client for OpenAI-compatible HTTP APIs.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    config: EmbeddingConfig,
    api_key: String,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    pub fn new(config: EmbeddingConfig, api_key: String) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PipelineError::Config(format!("http client: {e}")))?;
        Ok(Self {
            client,
            config,
            api_key,
        })
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn dims(&self) -> usize {
        self.config.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        let url = format!("{}/embeddings", self.config.api_base.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.config.model,
                "input": text,
            }))
            .send()
            .await
            .map_err(|e| PipelineError::EmbeddingFailed(e.to_string()))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(PipelineError::EmbeddingRateLimited);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::EmbeddingFailed(format!(
                "status {status}: {body}"
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::EmbeddingFailed(e.to_string()))?;
        let vector = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| PipelineError::EmbeddingFailed("empty data array".to_string()))?;
        Ok(vector)
    }
}

/// Cosine similarity of two vectors.
///
/// Returns 0.0 for mismatched lengths, empty vectors, zero-norm vectors, or
/// a non-finite result, so degenerate inputs sort last rather than poisoning
/// a ranking.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let sim = dot / (norm_a.sqrt() * norm_b.sqrt());
    if sim.is_finite() {
        sim
    } else {
        0.0
    }
}
