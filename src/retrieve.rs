//! Top-K chunk retrieval for a query vector.
//!
//! Retrieval tries the store's native similarity search first. If the
//! backend declines or fails, it falls back to fetching a bounded slice of
//! the document's chunks and scoring them in process. The fallback applies
//! no similarity threshold, only the count limit.

use tracing::debug;

use crate::config::RetrievalConfig;
use crate::embedding::cosine_similarity;
use crate::error::PipelineError;
use crate::models::ScoredChunk;
use crate::store::VectorStore;

/// Find the chunks of `document_id` most relevant to `query_vector`.
///
/// Results are ordered best first; ties keep chunk-index order. An empty
/// result is a valid outcome, distinct from
/// [`PipelineError::RetrievalUnavailable`], which means the store could not
/// be consulted at all.
pub async fn find_relevant(
    store: &dyn VectorStore,
    query_vector: &[f32],
    document_id: &str,
    config: &RetrievalConfig,
) -> Result<Vec<ScoredChunk>, PipelineError> {
    match store
        .similarity_search(
            query_vector,
            document_id,
            config.similarity_threshold,
            config.top_k,
        )
        .await
    {
        Ok(results) => Ok(results),
        Err(e) => {
            debug!(document_id, error = %e, "native similarity search unavailable, using linear scan");
            linear_scan(store, query_vector, document_id, config).await
        }
    }
}

async fn linear_scan(
    store: &dyn VectorStore,
    query_vector: &[f32],
    document_id: &str,
    config: &RetrievalConfig,
) -> Result<Vec<ScoredChunk>, PipelineError> {
    let fetch_limit = config.top_k * config.fallback_factor;
    let chunks = store
        .fetch_chunks(document_id, fetch_limit)
        .await
        .map_err(|e| PipelineError::RetrievalUnavailable(e.to_string()))?;

    let mut scored: Vec<ScoredChunk> = chunks
        .iter()
        .map(|embedded| ScoredChunk {
            chunk_index: embedded.chunk.chunk_index,
            content: embedded.chunk.content.clone(),
            similarity: cosine_similarity(query_vector, &embedded.vector),
        })
        .collect();
    // stable sort: equal scores keep the index order fetch_chunks guarantees
    scored.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(config.top_k);
    Ok(scored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::models::{ChatRole, Chunk, Document, EmbeddedChunk};
    use crate::store::{InMemoryStore, StoreError};

    /// Delegates everything to an inner store but declines native search.
    struct NoNativeSearch(InMemoryStore);

    #[async_trait]
    impl VectorStore for NoNativeSearch {
        async fn insert_document(&self, document: &Document) -> Result<(), StoreError> {
            self.0.insert_document(document).await
        }
        async fn insert_chunks(&self, chunks: &[EmbeddedChunk]) -> Result<(), StoreError> {
            self.0.insert_chunks(chunks).await
        }
        async fn delete_chunks(&self, document_id: &str) -> Result<(), StoreError> {
            self.0.delete_chunks(document_id).await
        }
        async fn delete_document(&self, document_id: &str) -> Result<(), StoreError> {
            self.0.delete_document(document_id).await
        }
        async fn get_document(&self, document_id: &str) -> Result<Option<Document>, StoreError> {
            self.0.get_document(document_id).await
        }
        async fn fetch_chunks(
            &self,
            document_id: &str,
            limit: usize,
        ) -> Result<Vec<EmbeddedChunk>, StoreError> {
            self.0.fetch_chunks(document_id, limit).await
        }
        async fn similarity_search(
            &self,
            _query: &[f32],
            _document_id: &str,
            _threshold: f32,
            _limit: usize,
        ) -> Result<Vec<ScoredChunk>, StoreError> {
            Err(StoreError::Unsupported)
        }
        async fn append_turn(
            &self,
            document_id: &str,
            owner_id: &str,
            role: ChatRole,
            content: &str,
        ) -> Result<(), StoreError> {
            self.0.append_turn(document_id, owner_id, role, content).await
        }
    }

    /// A store whose every operation fails.
    struct BrokenStore;

    #[async_trait]
    impl VectorStore for BrokenStore {
        async fn insert_document(&self, _: &Document) -> Result<(), StoreError> {
            Err(StoreError::Backend("down".into()))
        }
        async fn insert_chunks(&self, _: &[EmbeddedChunk]) -> Result<(), StoreError> {
            Err(StoreError::Backend("down".into()))
        }
        async fn delete_chunks(&self, _: &str) -> Result<(), StoreError> {
            Err(StoreError::Backend("down".into()))
        }
        async fn delete_document(&self, _: &str) -> Result<(), StoreError> {
            Err(StoreError::Backend("down".into()))
        }
        async fn get_document(&self, _: &str) -> Result<Option<Document>, StoreError> {
            Err(StoreError::Backend("down".into()))
        }
        async fn fetch_chunks(&self, _: &str, _: usize) -> Result<Vec<EmbeddedChunk>, StoreError> {
            Err(StoreError::Backend("down".into()))
        }
        async fn similarity_search(
            &self,
            _: &[f32],
            _: &str,
            _: f32,
            _: usize,
        ) -> Result<Vec<ScoredChunk>, StoreError> {
            Err(StoreError::Backend("down".into()))
        }
        async fn append_turn(
            &self,
            _: &str,
            _: &str,
            _: ChatRole,
            _: &str,
        ) -> Result<(), StoreError> {
            Err(StoreError::Backend("down".into()))
        }
    }

    fn embedded(index: i64, vector: Vec<f32>) -> EmbeddedChunk {
        EmbeddedChunk {
            chunk: Chunk {
                id: format!("c{index}"),
                document_id: "d1".to_string(),
                chunk_index: index,
                content: format!("chunk {index}"),
            },
            vector,
        }
    }

    fn config(top_k: usize, threshold: f32) -> RetrievalConfig {
        RetrievalConfig {
            top_k,
            similarity_threshold: threshold,
            fallback_factor: 2,
        }
    }

    #[tokio::test]
    async fn test_native_path_applies_threshold() {
        let store = InMemoryStore::new();
        store
            .insert_chunks(&[
                embedded(0, vec![1.0, 0.0]),
                embedded(1, vec![0.0, 1.0]),
            ])
            .await
            .unwrap();
        let results = find_relevant(&store, &[1.0, 0.0], "d1", &config(5, 0.5))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk_index, 0);
    }

    #[tokio::test]
    async fn test_fallback_ignores_threshold() {
        let store = NoNativeSearch(InMemoryStore::new());
        store
            .insert_chunks(&[
                embedded(0, vec![1.0, 0.0]),
                embedded(1, vec![0.0, 1.0]),
            ])
            .await
            .unwrap();
        // threshold would exclude the orthogonal chunk on the native path
        let results = find_relevant(&store, &[1.0, 0.0], "d1", &config(5, 0.5))
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk_index, 0);
        assert_eq!(results[1].chunk_index, 1);
    }

    #[tokio::test]
    async fn test_fallback_truncates_to_top_k() {
        let store = NoNativeSearch(InMemoryStore::new());
        let batch: Vec<EmbeddedChunk> = (0..8).map(|i| embedded(i, vec![1.0, 0.0])).collect();
        store.insert_chunks(&batch).await.unwrap();
        let results = find_relevant(&store, &[1.0, 0.0], "d1", &config(3, 0.0))
            .await
            .unwrap();
        assert_eq!(results.len(), 3);
        // equal scores keep index order
        let indices: Vec<i64> = results.iter().map(|r| r.chunk_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_store_failure_is_retrieval_unavailable() {
        let err = find_relevant(&BrokenStore, &[1.0], "d1", &config(5, 0.5))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::RetrievalUnavailable(_)));
    }

    #[tokio::test]
    async fn test_empty_document_yields_empty_results() {
        let store = InMemoryStore::new();
        let results = find_relevant(&store, &[1.0], "missing", &config(5, 0.5))
            .await
            .unwrap();
        assert!(results.is_empty());
    }
}
