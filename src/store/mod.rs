//! Vector store abstraction.
//!
//! The pipeline talks to persistence through [`VectorStore`]. Two backends
//! ship in-tree: [`InMemoryStore`] for tests and small deployments, and
//! [`SqliteStore`] for durable storage. A backend may decline native
//! similarity search with [`StoreError::Unsupported`]; retrieval then falls
//! back to an in-process scan over [`VectorStore::fetch_chunks`].

mod memory;
mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{ChatRole, Document, EmbeddedChunk, ScoredChunk};

/// Errors from a store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend does not implement this operation natively.
    #[error("operation not supported by this store")]
    Unsupported,

    /// The backend failed.
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Persistence operations required by the pipeline.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert a document row. Fails if the id already exists.
    async fn insert_document(&self, document: &Document) -> Result<(), StoreError>;

    /// Insert a batch of embedded chunks.
    async fn insert_chunks(&self, chunks: &[EmbeddedChunk]) -> Result<(), StoreError>;

    /// Delete all chunks of a document. Deleting a document with no chunks
    /// is not an error.
    async fn delete_chunks(&self, document_id: &str) -> Result<(), StoreError>;

    /// Delete a document row. Deleting a missing document is not an error.
    async fn delete_document(&self, document_id: &str) -> Result<(), StoreError>;

    /// Fetch a document by id.
    async fn get_document(&self, document_id: &str) -> Result<Option<Document>, StoreError>;

    /// Fetch up to `limit` chunks of a document in chunk-index order.
    async fn fetch_chunks(
        &self,
        document_id: &str,
        limit: usize,
    ) -> Result<Vec<EmbeddedChunk>, StoreError>;

    /// Native similarity search: chunks of `document_id` scoring at or above
    /// `threshold` against `query`, best first, at most `limit`.
    ///
    /// Backends without native vector search return
    /// [`StoreError::Unsupported`].
    async fn similarity_search(
        &self,
        query: &[f32],
        document_id: &str,
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, StoreError>;

    /// Append a conversation turn to a document's transcript.
    async fn append_turn(
        &self,
        document_id: &str,
        owner_id: &str,
        role: ChatRole,
        content: &str,
    ) -> Result<(), StoreError>;
}
