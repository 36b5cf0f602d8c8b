//! SQLite store backend.
//!
//! Durable backend over sqlx. Embedding vectors are stored as little-endian
//! `f32` blobs. SQLite has no native vector index, so
//! [`VectorStore::similarity_search`] reports [`StoreError::Unsupported`]
//! and retrieval uses its in-process fallback scan.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{ChatRole, Chunk, Document, EmbeddedChunk, ScoredChunk};
use crate::store::{StoreError, VectorStore};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS documents (
        id TEXT PRIMARY KEY,
        owner_id TEXT NOT NULL,
        name TEXT NOT NULL,
        content TEXT NOT NULL,
        chunk_count INTEGER NOT NULL,
        created_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS chunks (
        id TEXT PRIMARY KEY,
        document_id TEXT NOT NULL,
        chunk_index INTEGER NOT NULL,
        content TEXT NOT NULL,
        embedding BLOB NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_chunks_document
        ON chunks(document_id, chunk_index)",
    "CREATE TABLE IF NOT EXISTS chat_turns (
        id TEXT PRIMARY KEY,
        document_id TEXT NOT NULL,
        owner_id TEXT NOT NULL,
        role TEXT NOT NULL,
        content TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )",
];

/// SQLite-backed [`VectorStore`].
pub struct SqliteStore {
    pool: SqlitePool,
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

impl SqliteStore {
    /// Connect to a SQLite database and create the schema if missing.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(backend)?;
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&pool)
            .await
            .map_err(backend)?;
        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await.map_err(backend)?;
        }
        Ok(Self { pool })
    }
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn insert_document(&self, document: &Document) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO documents (id, owner_id, name, content, chunk_count, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&document.id)
        .bind(&document.owner_id)
        .bind(&document.name)
        .bind(&document.content)
        .bind(document.chunk_count)
        .bind(document.created_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn insert_chunks(&self, chunks: &[EmbeddedChunk]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        for embedded in chunks {
            sqlx::query(
                "INSERT INTO chunks (id, document_id, chunk_index, content, embedding)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&embedded.chunk.id)
            .bind(&embedded.chunk.document_id)
            .bind(embedded.chunk.chunk_index)
            .bind(&embedded.chunk.content)
            .bind(encode_vector(&embedded.vector))
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }
        tx.commit().await.map_err(backend)?;
        Ok(())
    }

    async fn delete_chunks(&self, document_id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(document_id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn delete_document(&self, document_id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(document_id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn get_document(&self, document_id: &str) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query(
            "SELECT id, owner_id, name, content, chunk_count, created_at
             FROM documents WHERE id = ?",
        )
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(|row| {
            Ok(Document {
                id: row.try_get("id").map_err(backend)?,
                owner_id: row.try_get("owner_id").map_err(backend)?,
                name: row.try_get("name").map_err(backend)?,
                content: row.try_get("content").map_err(backend)?,
                chunk_count: row.try_get("chunk_count").map_err(backend)?,
                created_at: row.try_get("created_at").map_err(backend)?,
            })
        })
        .transpose()
    }

    async fn fetch_chunks(
        &self,
        document_id: &str,
        limit: usize,
    ) -> Result<Vec<EmbeddedChunk>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, document_id, chunk_index, content, embedding
             FROM chunks WHERE document_id = ?
             ORDER BY chunk_index ASC LIMIT ?",
        )
        .bind(document_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter()
            .map(|row| {
                let embedding: Vec<u8> = row.try_get("embedding").map_err(backend)?;
                Ok(EmbeddedChunk {
                    chunk: Chunk {
                        id: row.try_get("id").map_err(backend)?,
                        document_id: row.try_get("document_id").map_err(backend)?,
                        chunk_index: row.try_get("chunk_index").map_err(backend)?,
                        content: row.try_get("content").map_err(backend)?,
                    },
                    vector: decode_vector(&embedding),
                })
            })
            .collect()
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
        sqlx::query(
            "INSERT INTO chat_turns (id, document_id, owner_id, role, content, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(document_id)
        .bind(owner_id)
        .bind(role.as_str())
        .bind(content)
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());
        let store = SqliteStore::connect(&url).await.unwrap();
        (dir, store)
    }

    fn doc(id: &str) -> Document {
        Document {
            id: id.to_string(),
            owner_id: "owner".to_string(),
            name: "doc.txt".to_string(),
            content: "full text".to_string(),
            chunk_count: 2,
            created_at: 1_700_000_000_000,
        }
    }

    fn embedded(document_id: &str, index: i64, vector: Vec<f32>) -> EmbeddedChunk {
        EmbeddedChunk {
            chunk: Chunk {
                id: Uuid::new_v4().to_string(),
                document_id: document_id.to_string(),
                chunk_index: index,
                content: format!("chunk {index}"),
            },
            vector,
        }
    }

    #[test]
    fn test_vector_blob_roundtrip() {
        let vector = vec![0.25f32, -1.5, 3.125];
        assert_eq!(decode_vector(&encode_vector(&vector)), vector);
        assert!(decode_vector(&[]).is_empty());
    }

    #[tokio::test]
    async fn test_document_roundtrip() {
        let (_dir, store) = temp_store().await;
        store.insert_document(&doc("d1")).await.unwrap();
        let fetched = store.get_document("d1").await.unwrap().unwrap();
        assert_eq!(fetched.owner_id, "owner");
        assert_eq!(fetched.chunk_count, 2);
        assert!(store.get_document("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_document_rejected() {
        let (_dir, store) = temp_store().await;
        store.insert_document(&doc("d1")).await.unwrap();
        assert!(store.insert_document(&doc("d1")).await.is_err());
    }

    #[tokio::test]
    async fn test_chunks_roundtrip_in_index_order() {
        let (_dir, store) = temp_store().await;
        store
            .insert_chunks(&[
                embedded("d1", 1, vec![0.0, 1.0]),
                embedded("d1", 0, vec![1.0, 0.0]),
            ])
            .await
            .unwrap();
        let chunks = store.fetch_chunks("d1", 10).await.unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chunk.chunk_index, 0);
        assert_eq!(chunks[0].vector, vec![1.0, 0.0]);
        assert_eq!(chunks[1].chunk.chunk_index, 1);
    }

    #[tokio::test]
    async fn test_fetch_chunks_respects_limit() {
        let (_dir, store) = temp_store().await;
        let batch: Vec<EmbeddedChunk> = (0..5).map(|i| embedded("d1", i, vec![1.0])).collect();
        store.insert_chunks(&batch).await.unwrap();
        assert_eq!(store.fetch_chunks("d1", 3).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_deletes_are_idempotent() {
        let (_dir, store) = temp_store().await;
        store.insert_document(&doc("d1")).await.unwrap();
        store.insert_chunks(&[embedded("d1", 0, vec![1.0])]).await.unwrap();
        store.delete_chunks("d1").await.unwrap();
        store.delete_document("d1").await.unwrap();
        store.delete_chunks("d1").await.unwrap();
        store.delete_document("d1").await.unwrap();
        assert!(store.fetch_chunks("d1", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_similarity_search_unsupported() {
        let (_dir, store) = temp_store().await;
        let err = store
            .similarity_search(&[1.0], "d1", 0.5, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unsupported));
    }

    #[tokio::test]
    async fn test_append_turns() {
        let (_dir, store) = temp_store().await;
        store
            .append_turn("d1", "owner", ChatRole::User, "question")
            .await
            .unwrap();
        store
            .append_turn("d1", "owner", ChatRole::Assistant, "answer")
            .await
            .unwrap();
        let rows = sqlx::query("SELECT role, content FROM chat_turns ORDER BY created_at, role DESC")
            .fetch_all(&store.pool)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        let role: String = rows[0].try_get("role").unwrap();
        assert_eq!(role, "user");
    }
}
