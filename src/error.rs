//! Error types for the ragline pipeline.
//!
//! Every variant exposes a short machine-readable [`code`](PipelineError::code)
//! and a generic [`user_message`](PipelineError::user_message). Raw upstream
//! error text is kept in the `Display` output for logs but is never part of
//! the user-facing message.

use thiserror::Error;

/// Result type alias using ragline's error type.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Core error type for ingestion and query operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The filename extension is not one of pdf, docx, txt, text.
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// The upload exceeds the configured byte ceiling.
    #[error("file is {actual} bytes, limit is {limit}")]
    FileTooLarge { actual: usize, limit: usize },

    /// The extraction library failed on the file contents.
    #[error("text extraction failed: {0}")]
    ExtractionFailed(String),

    /// Extraction or normalization produced too little usable text.
    #[error("document contains no extractable text")]
    EmptyDocument,

    /// The embedding service returned a different number of vectors than
    /// chunks submitted.
    #[error("embedding count mismatch: {expected} chunks, {actual} vectors")]
    EmbeddingCountMismatch { expected: usize, actual: usize },

    /// An embedding vector did not have the model's fixed dimensionality.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    EmbeddingDimensionMismatch { expected: usize, actual: usize },

    /// The embedding service rejected the request with a rate limit.
    #[error("embedding request was rate limited")]
    EmbeddingRateLimited,

    /// The embedding service failed for another reason.
    #[error("embedding request failed: {0}")]
    EmbeddingFailed(String),

    /// A vector store write failed. The orchestrator rolls back any partial
    /// state before surfacing this.
    #[error("persistence failed: {0}")]
    PersistenceFailed(String),

    /// The vector store could not be reached to fetch chunks. Distinct from
    /// "no relevant content": this means we could not check.
    #[error("retrieval unavailable: {0}")]
    RetrievalUnavailable(String),

    /// Retrieval yielded zero chunks above the similarity threshold. This is
    /// a normal terminal outcome of a query, not a system fault.
    #[error("no relevant content found for the query")]
    NoRelevantContent,

    /// The completion service rejected the request with a rate limit.
    #[error("completion request was rate limited")]
    CompletionRateLimited,

    /// The completion service reported an exhausted quota.
    #[error("completion quota exhausted")]
    CompletionQuotaExceeded,

    /// The completion stream failed for another reason.
    #[error("completion stream failed: {0}")]
    CompletionFailed(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    /// Short machine-readable code for API responses and logs.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::UnsupportedFileType(_) => "unsupported_file_type",
            PipelineError::FileTooLarge { .. } => "file_too_large",
            PipelineError::ExtractionFailed(_) => "extraction_failed",
            PipelineError::EmptyDocument => "empty_document",
            PipelineError::EmbeddingCountMismatch { .. } => "embedding_count_mismatch",
            PipelineError::EmbeddingDimensionMismatch { .. } => "embedding_dimension_mismatch",
            PipelineError::EmbeddingRateLimited => "embedding_rate_limited",
            PipelineError::EmbeddingFailed(_) => "embedding_failed",
            PipelineError::PersistenceFailed(_) => "persistence_failed",
            PipelineError::RetrievalUnavailable(_) => "retrieval_unavailable",
            PipelineError::NoRelevantContent => "no_relevant_content",
            PipelineError::CompletionRateLimited => "completion_rate_limited",
            PipelineError::CompletionQuotaExceeded => "completion_quota_exceeded",
            PipelineError::CompletionFailed(_) => "completion_failed",
            PipelineError::Config(_) => "config_error",
        }
    }

    /// Generic human-readable message, safe to show to end users.
    ///
    /// Upstream error details are deliberately omitted here; they remain in
    /// the `Display` output for operator logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            PipelineError::UnsupportedFileType(_) => {
                "This file type is not supported. Please upload a PDF, DOCX, or TXT file."
            }
            PipelineError::FileTooLarge { .. } => "The file is too large to process.",
            PipelineError::ExtractionFailed(_) => "The file could not be read.",
            PipelineError::EmptyDocument => {
                "The document appears to be empty or contains no extractable text."
            }
            PipelineError::EmbeddingCountMismatch { .. }
            | PipelineError::EmbeddingDimensionMismatch { .. }
            | PipelineError::EmbeddingFailed(_) => "The document could not be indexed.",
            PipelineError::EmbeddingRateLimited | PipelineError::CompletionRateLimited => {
                "The service is busy. Please try again in a moment."
            }
            PipelineError::PersistenceFailed(_) => "The document could not be saved.",
            PipelineError::RetrievalUnavailable(_) => {
                "Search is temporarily unavailable. Please try again."
            }
            PipelineError::NoRelevantContent => {
                "No relevant content was found in this document for your question."
            }
            PipelineError::CompletionQuotaExceeded => "The answer service quota is exhausted.",
            PipelineError::CompletionFailed(_) => "The answer could not be generated.",
            PipelineError::Config(_) => "The service is misconfigured.",
        }
    }

    /// Whether the caller may reasonably retry the same request.
    ///
    /// Validation errors are never retryable; transient upstream errors are.
    /// The pipeline itself never retries automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::EmbeddingRateLimited
                | PipelineError::CompletionRateLimited
                | PipelineError::PersistenceFailed(_)
                | PipelineError::RetrievalUnavailable(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(PipelineError::EmptyDocument.code(), "empty_document");
        assert_eq!(
            PipelineError::EmbeddingCountMismatch {
                expected: 5,
                actual: 4
            }
            .code(),
            "embedding_count_mismatch"
        );
        assert_eq!(PipelineError::NoRelevantContent.code(), "no_relevant_content");
    }

    #[test]
    fn test_user_message_hides_upstream_detail() {
        let err = PipelineError::ExtractionFailed("pdf parser exploded at byte 4212".into());
        assert!(!err.user_message().contains("4212"));
        // the detail is still available for logs
        assert!(err.to_string().contains("4212"));
    }

    #[test]
    fn test_validation_errors_not_retryable() {
        assert!(!PipelineError::UnsupportedFileType("x.png".into()).is_retryable());
        assert!(!PipelineError::EmptyDocument.is_retryable());
        assert!(PipelineError::EmbeddingRateLimited.is_retryable());
    }
}
