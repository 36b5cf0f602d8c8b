//! In-memory store backend.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{ChatRole, ChatTurn, Document, EmbeddedChunk, ScoredChunk};
use crate::store::{StoreError, VectorStore};

/// Store backend holding everything in process memory.
///
/// Implements native similarity search with a linear cosine scan. Used by
/// tests and by deployments that re-ingest on startup.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    documents: HashMap<String, Document>,
    chunks: HashMap<String, Vec<EmbeddedChunk>>,
    turns: HashMap<String, Vec<ChatTurn>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transcript of a document, in append order. Test and debug helper.
    pub fn turns(&self, document_id: &str) -> Vec<ChatTurn> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.turns.get(document_id).cloned().unwrap_or_default()
    }

    /// Number of stored chunks for a document. Test and debug helper.
    pub fn chunk_count(&self, document_id: &str) -> usize {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.chunks.get(document_id).map_or(0, Vec::len)
    }

    /// Total number of stored documents. Test and debug helper.
    pub fn document_count(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.documents.len()
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn insert_document(&self, document: &Document) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if inner.documents.contains_key(&document.id) {
            return Err(StoreError::Backend(format!(
                "document {} already exists",
                document.id
            )));
        }
        inner.documents.insert(document.id.clone(), document.clone());
        Ok(())
    }

    async fn insert_chunks(&self, chunks: &[EmbeddedChunk]) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        for embedded in chunks {
            inner
                .chunks
                .entry(embedded.chunk.document_id.clone())
                .or_default()
                .push(embedded.clone());
        }
        Ok(())
    }

    async fn delete_chunks(&self, document_id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.chunks.remove(document_id);
        Ok(())
    }

    async fn delete_document(&self, document_id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.documents.remove(document_id);
        Ok(())
    }

    async fn get_document(&self, document_id: &str) -> Result<Option<Document>, StoreError> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        Ok(inner.documents.get(document_id).cloned())
    }

    async fn fetch_chunks(
        &self,
        document_id: &str,
        limit: usize,
    ) -> Result<Vec<EmbeddedChunk>, StoreError> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let mut chunks = inner.chunks.get(document_id).cloned().unwrap_or_default();
        chunks.sort_by_key(|c| c.chunk.chunk_index);
        chunks.truncate(limit);
        Ok(chunks)
    }

    async fn similarity_search(
        &self,
        query: &[f32],
        document_id: &str,
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, StoreError> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let mut scored: Vec<ScoredChunk> = inner
            .chunks
            .get(document_id)
            .map(|chunks| {
                chunks
                    .iter()
                    .map(|embedded| ScoredChunk {
                        chunk_index: embedded.chunk.chunk_index,
                        content: embedded.chunk.content.clone(),
                        similarity: cosine_similarity(query, &embedded.vector),
                    })
                    .filter(|s| s.similarity >= threshold)
                    .collect()
            })
            .unwrap_or_default();
        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.chunk_index.cmp(&b.chunk_index))
        });
        scored.truncate(limit);
        Ok(scored)
    }

    async fn append_turn(
        &self,
        document_id: &str,
        _owner_id: &str,
        role: ChatRole,
        content: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner
            .turns
            .entry(document_id.to_string())
            .or_default()
            .push(ChatTurn {
                role,
                content: content.to_string(),
            });
        Ok(())
    }
}
