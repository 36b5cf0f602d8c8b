//! Core data models used throughout the ragline pipeline.
//!
//! These types represent the documents, chunks, and retrieval results that
//! flow through the ingestion and query paths.

use serde::Serialize;

/// Supported upload formats, resolved once from the filename extension.
///
/// Resolving the format up front (instead of branching on extension strings
/// throughout the pipeline) lets every downstream match be exhaustive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Pdf,
    Docx,
    Text,
}

impl FileFormat {
    /// Resolve a format from a filename's extension (case-insensitive).
    ///
    /// Recognized extensions: `pdf`, `docx`, `txt`, `text`. Returns `None`
    /// for anything else, including filenames without an extension.
    pub fn from_filename(filename: &str) -> Option<FileFormat> {
        let (_, ext) = filename.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(FileFormat::Pdf),
            "docx" => Some(FileFormat::Docx),
            "txt" | "text" => Some(FileFormat::Text),
            _ => None,
        }
    }
}

/// A bounded slice of a document's normalized text, the unit of embedding
/// and retrieval.
///
/// Chunk indices for one document are contiguous starting at 0; no two
/// chunks of the same document share an index.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub content: String,
}

/// A chunk paired with its embedding vector.
///
/// Every persisted chunk has exactly one vector of the model's fixed
/// dimensionality; a mismatch is a hard ingestion failure.
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// A persisted document, created once per successful ingestion.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub content: String,
    pub chunk_count: i64,
    pub created_at: i64,
}

/// A chunk scored against a query vector, produced only at query time.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk_index: i64,
    pub content: String,
    /// Cosine similarity in `[-1.0, 1.0]`.
    pub similarity: f32,
}

/// A citation record for one retrieved chunk.
///
/// `chunk_index` is kept 0-based; display layers add 1.
#[derive(Debug, Clone, Serialize)]
pub struct SourceRef {
    pub chunk_index: i64,
    pub preview: String,
    pub similarity: f32,
}

/// Role of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

/// A single conversation turn sent to the completion service.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Result of a successful ingestion.
#[derive(Debug, Clone)]
pub struct IngestReceipt {
    pub document_id: String,
    pub chunk_count: usize,
}

/// Final result of a streamed query answer.
#[derive(Debug, Clone)]
pub struct QueryAnswer {
    pub full_text: String,
    pub sources: Vec<SourceRef>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(FileFormat::from_filename("report.pdf"), Some(FileFormat::Pdf));
        assert_eq!(FileFormat::from_filename("notes.DOCX"), Some(FileFormat::Docx));
        assert_eq!(FileFormat::from_filename("a.txt"), Some(FileFormat::Text));
        assert_eq!(FileFormat::from_filename("a.text"), Some(FileFormat::Text));
    }

    #[test]
    fn test_format_unknown_extension() {
        assert_eq!(FileFormat::from_filename("image.png"), None);
        assert_eq!(FileFormat::from_filename("archive.tar.gz"), None);
    }

    #[test]
    fn test_format_no_extension() {
        assert_eq!(FileFormat::from_filename("README"), None);
        assert_eq!(FileFormat::from_filename(""), None);
    }

    #[test]
    fn test_chat_role_strings() {
        assert_eq!(ChatRole::User.as_str(), "user");
        assert_eq!(ChatRole::Assistant.as_str(), "assistant");
    }
}
