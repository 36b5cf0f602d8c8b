//! Ingestion and query orchestration.
//!
//! [`Pipeline`] wires extraction, normalization, chunking, embedding, the
//! vector store, retrieval, and the completion client together. It owns the
//! two top-level operations: [`Pipeline::ingest`] and
//! [`Pipeline::answer_query`].

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::completion::CompletionClient;
use crate::config::{self, PipelineConfig};
use crate::context::{build_context, format_sources, generate_system_prompt};
use crate::embedding::EmbeddingClient;
use crate::error::PipelineError;
use crate::extract::{extract_text, non_whitespace_len};
use crate::models::{ChatRole, ChatTurn, Document, EmbeddedChunk, IngestReceipt, QueryAnswer};
use crate::normalize::normalize_text;
use crate::retrieve::find_relevant;
use crate::store::VectorStore;
use crate::chunk;

/// Capacity of the fragment channel between the answer task and consumer.
const FRAGMENT_BUFFER: usize = 32;

/// The document ingestion and query-answering pipeline.
pub struct Pipeline {
    config: PipelineConfig,
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingClient>,
    completion: Arc<dyn CompletionClient>,
}

/// A streamed answer in progress.
///
/// Fragments arrive in generation order via [`next_fragment`]; the final
/// [`QueryAnswer`] (or the error that ended the stream) comes from
/// [`finish`]. Dropping the stream aborts the answer; the assistant turn is
/// only persisted when the stream completes cleanly.
///
/// [`next_fragment`]: QueryStream::next_fragment
/// [`finish`]: QueryStream::finish
pub struct QueryStream {
    fragments: mpsc::Receiver<String>,
    outcome: oneshot::Receiver<Result<QueryAnswer, PipelineError>>,
}

impl std::fmt::Debug for QueryStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryStream").finish_non_exhaustive()
    }
}

impl QueryStream {
    /// Next answer fragment, or `None` once the stream has ended.
    pub async fn next_fragment(&mut self) -> Option<String> {
        self.fragments.recv().await
    }

    /// Wait for the answer to complete and return the full result.
    ///
    /// Drains any unread fragments first, so calling `finish` without
    /// consuming the stream cannot deadlock the answer task.
    pub async fn finish(mut self) -> Result<QueryAnswer, PipelineError> {
        while self.fragments.recv().await.is_some() {}
        match self.outcome.await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::CompletionFailed(
                "answer task ended unexpectedly".to_string(),
            )),
        }
    }
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingClient>,
        completion: Arc<dyn CompletionClient>,
    ) -> Result<Self, PipelineError> {
        config::validate(&config)?;
        Ok(Self {
            config,
            store,
            embedder,
            completion,
        })
    }

    /// Ingest an uploaded file: extract, normalize, chunk, embed, persist.
    ///
    /// All embeddings are validated before anything is written, and a
    /// partial write is rolled back, so a document is either fully indexed
    /// or absent.
    pub async fn ingest(
        &self,
        bytes: &[u8],
        filename: &str,
        owner_id: &str,
    ) -> Result<IngestReceipt, PipelineError> {
        let raw = extract_text(bytes, filename, &self.config.extraction)?;
        let text = normalize_text(&raw);
        // normalization can strip a document down to nothing
        if non_whitespace_len(&text) < self.config.extraction.min_text_chars {
            return Err(PipelineError::EmptyDocument);
        }

        let document_id = Uuid::new_v4().to_string();
        let chunks = chunk::chunk_document(&document_id, &text, &self.config.chunking);
        if chunks.is_empty() {
            return Err(PipelineError::EmptyDocument);
        }
        debug!(document_id, chunk_count = chunks.len(), "document chunked");

        let vectors = self.embed_all(&chunks).await?;

        // validation gate: nothing is written until every chunk has a
        // vector of the right dimensionality
        if vectors.len() != chunks.len() {
            return Err(PipelineError::EmbeddingCountMismatch {
                expected: chunks.len(),
                actual: vectors.len(),
            });
        }
        let dims = self.embedder.dims();
        for vector in &vectors {
            if vector.len() != dims {
                return Err(PipelineError::EmbeddingDimensionMismatch {
                    expected: dims,
                    actual: vector.len(),
                });
            }
        }

        let embedded: Vec<EmbeddedChunk> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| EmbeddedChunk { chunk, vector })
            .collect();

        let document = Document {
            id: document_id.clone(),
            owner_id: owner_id.to_string(),
            name: filename.to_string(),
            content: text,
            chunk_count: embedded.len() as i64,
            created_at: Utc::now().timestamp_millis(),
        };
        self.store
            .insert_document(&document)
            .await
            .map_err(|e| PipelineError::PersistenceFailed(e.to_string()))?;

        for batch in embedded.chunks(self.config.embedding.batch_size) {
            if let Err(e) = self.store.insert_chunks(batch).await {
                self.rollback_ingest(&document_id).await;
                return Err(PipelineError::PersistenceFailed(e.to_string()));
            }
        }

        info!(
            document_id,
            owner_id,
            chunk_count = embedded.len(),
            "document ingested"
        );
        Ok(IngestReceipt {
            document_id,
            chunk_count: embedded.len(),
        })
    }

    /// Embed chunk contents in batches, pausing between batches.
    async fn embed_all(&self, chunks: &[crate::models::Chunk]) -> Result<Vec<Vec<f32>>, PipelineError> {
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let batch_size = self.config.embedding.batch_size;
        let mut vectors = Vec::with_capacity(texts.len());
        for (i, batch) in texts.chunks(batch_size).enumerate() {
            if i > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.embedding.batch_delay_ms))
                    .await;
            }
            vectors.extend(self.embedder.embed_batch(batch).await?);
        }
        Ok(vectors)
    }

    /// Best-effort cleanup after a failed chunk write. Failures here are
    /// logged and never mask the original error.
    async fn rollback_ingest(&self, document_id: &str) {
        if let Err(e) = self.store.delete_chunks(document_id).await {
            warn!(document_id, error = %e, "rollback: failed to delete chunks");
        }
        if let Err(e) = self.store.delete_document(document_id).await {
            warn!(document_id, error = %e, "rollback: failed to delete document");
        }
    }

    /// Answer a question about one ingested document with a streamed,
    /// citation-grounded completion.
    ///
    /// The user turn is persisted before streaming starts; the assistant
    /// turn is persisted only if the stream completes cleanly. Returns
    /// [`PipelineError::NoRelevantContent`] without contacting the
    /// completion service when retrieval finds nothing.
    ///
    /// `prior_turns` is earlier conversation the caller wants the model to
    /// see; the pipeline does not replay the stored transcript on its own.
    pub async fn answer_query(
        &self,
        document_id: &str,
        owner_id: &str,
        question: &str,
        prior_turns: &[ChatTurn],
    ) -> Result<QueryStream, PipelineError> {
        let document = self
            .store
            .get_document(document_id)
            .await
            .map_err(|e| PipelineError::RetrievalUnavailable(e.to_string()))?
            .ok_or_else(|| {
                PipelineError::RetrievalUnavailable(format!("document {document_id} not found"))
            })?;

        let query_vector = self.embedder.embed(question).await?;
        let scored = find_relevant(
            self.store.as_ref(),
            &query_vector,
            document_id,
            &self.config.retrieval,
        )
        .await?;
        if scored.is_empty() {
            return Err(PipelineError::NoRelevantContent);
        }
        debug!(document_id, retrieved = scored.len(), "context retrieved");

        let context = build_context(&scored);
        let system_prompt = generate_system_prompt(&document.name, &context);
        let sources = format_sources(&scored);

        self.store
            .append_turn(document_id, owner_id, ChatRole::User, question)
            .await
            .map_err(|e| PipelineError::PersistenceFailed(e.to_string()))?;

        let mut turns = prior_turns.to_vec();
        turns.push(ChatTurn::user(question));
        let mut token_stream = self
            .completion
            .stream_completion(&system_prompt, &turns)
            .await?;

        let (fragment_tx, fragment_rx) = mpsc::channel::<String>(FRAGMENT_BUFFER);
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let store = Arc::clone(&self.store);
        let document_id = document_id.to_string();
        let owner_id = owner_id.to_string();

        tokio::spawn(async move {
            let mut full_text = String::new();
            let outcome = loop {
                match token_stream.next().await {
                    Some(Ok(fragment)) => {
                        full_text.push_str(&fragment);
                        if fragment_tx.send(fragment).await.is_err() {
                            // consumer dropped the stream; abort without
                            // persisting the assistant turn
                            break Err(PipelineError::CompletionFailed(
                                "answer stream abandoned".to_string(),
                            ));
                        }
                    }
                    Some(Err(e)) => break Err(e),
                    None => {
                        break match store
                            .append_turn(
                                &document_id,
                                &owner_id,
                                ChatRole::Assistant,
                                &full_text,
                            )
                            .await
                        {
                            Ok(()) => Ok(QueryAnswer { full_text, sources }),
                            Err(e) => Err(PipelineError::PersistenceFailed(e.to_string())),
                        };
                    }
                }
            };
            drop(fragment_tx);
            if let Err(e) = &outcome {
                debug!(document_id, error = %e, "answer stream ended with error");
            }
            let _ = outcome_tx.send(outcome);
        });

        Ok(QueryStream {
            fragments: fragment_rx,
            outcome: outcome_rx,
        })
    }
}
