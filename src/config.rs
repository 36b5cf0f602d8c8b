use anyhow::Context;
use serde::Deserialize;
use std::path::Path;

use crate::error::PipelineError;

/// Top-level pipeline configuration.
///
/// Every section has defaults, so an empty TOML file (or `Default::default()`)
/// yields a working configuration apart from provider credentials.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct PipelineConfig {
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    /// Uploads above this byte count are refused before any parsing work.
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: usize,
    /// Minimum non-whitespace characters for a document to count as usable.
    #[serde(default = "default_min_text_chars")]
    pub min_text_chars: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: default_max_file_bytes(),
            min_text_chars: default_min_text_chars(),
        }
    }
}

fn default_max_file_bytes() -> usize {
    10 * 1024 * 1024
}
fn default_min_text_chars() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    1000
}
fn default_overlap_chars() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Fixed vector dimensionality of the embedding model.
    #[serde(default = "default_dims")]
    pub dims: usize,
    /// Chunks embedded concurrently per batch during ingestion.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Pause between batches, to stay under upstream rate limits.
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            dims: default_dims(),
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
            api_base: default_api_base(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_dims() -> usize {
    1536
}
fn default_batch_size() -> usize {
    10
}
fn default_batch_delay_ms() -> u64 {
    100
}
fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Minimum similarity for the store's native search path. The linear
    /// fallback scan applies no threshold, only a count limit.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    /// The fallback scan fetches `top_k * fallback_factor` chunks.
    #[serde(default = "default_fallback_factor")]
    pub fallback_factor: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            similarity_threshold: default_similarity_threshold(),
            fallback_factor: default_fallback_factor(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_similarity_threshold() -> f32 {
    0.7
}
fn default_fallback_factor() -> usize {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    #[serde(default = "default_completion_model")]
    pub model: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_completion_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: default_completion_model(),
            api_base: default_api_base(),
            timeout_secs: default_completion_timeout_secs(),
        }
    }
}

fn default_completion_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_completion_timeout_secs() -> u64 {
    120
}

/// Load and validate a [`PipelineConfig`] from a TOML file.
pub fn load_config(path: &Path) -> Result<PipelineConfig, PipelineError> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))
        .map_err(|e| PipelineError::Config(e.to_string()))?;

    let config: PipelineConfig =
        toml::from_str(&content).map_err(|e| PipelineError::Config(e.to_string()))?;

    validate(&config)?;
    Ok(config)
}

/// Validate invariants that serde defaults cannot express.
pub fn validate(config: &PipelineConfig) -> Result<(), PipelineError> {
    if config.chunking.max_chars == 0 {
        return Err(PipelineError::Config("chunking.max_chars must be > 0".into()));
    }
    if config.chunking.overlap_chars >= config.chunking.max_chars {
        return Err(PipelineError::Config(
            "chunking.overlap_chars must be < chunking.max_chars".into(),
        ));
    }
    if config.embedding.dims == 0 {
        return Err(PipelineError::Config("embedding.dims must be > 0".into()));
    }
    if config.embedding.batch_size == 0 {
        return Err(PipelineError::Config("embedding.batch_size must be > 0".into()));
    }
    if config.retrieval.top_k == 0 {
        return Err(PipelineError::Config("retrieval.top_k must be >= 1".into()));
    }
    if !(-1.0..=1.0).contains(&config.retrieval.similarity_threshold) {
        return Err(PipelineError::Config(
            "retrieval.similarity_threshold must be in [-1.0, 1.0]".into(),
        ));
    }
    if config.retrieval.fallback_factor == 0 {
        return Err(PipelineError::Config(
            "retrieval.fallback_factor must be >= 1".into(),
        ));
    }
    Ok(())
}
