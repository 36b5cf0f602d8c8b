//! Prompt context rendering and source citations.

use crate::models::{ScoredChunk, SourceRef};

const PREVIEW_CHARS: usize = 100;

/// Render retrieved chunks into the context block of the prompt.
///
/// Chunks are labeled 1-based with their similarity as a percentage, so the
/// model can cite them and answers can link back to the document.
pub fn build_context(chunks: &[ScoredChunk]) -> String {
    if chunks.is_empty() {
        return "No relevant context found.".to_string();
    }
    chunks
        .iter()
        .map(|chunk| {
            format!(
                "[Chunk {} (similarity: {:.1}%)]\n{}",
                chunk.chunk_index + 1,
                chunk.similarity * 100.0,
                chunk.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

/// Build the system prompt for a grounded answer over one document.
pub fn generate_system_prompt(document_name: &str, context: &str) -> String {
    format!(
        "You are an assistant answering questions about the document \"{document_name}\".\n\
         Answer using only the context excerpts below. When you use an excerpt, \
         cite it as [Chunk X] using its label. If the context does not contain \
         the answer, say so instead of guessing.\n\n\
         Context:\n{context}"
    )
}

/// Build citation records for the retrieved chunks.
///
/// Previews are truncated to 100 characters with an ellipsis.
/// Indices stay 0-based; display layers add 1.
pub fn format_sources(chunks: &[ScoredChunk]) -> Vec<SourceRef> {
    chunks
        .iter()
        .map(|chunk| {
            let preview = if chunk.content.chars().count() > PREVIEW_CHARS {
                let cut: String = chunk.content.chars().take(PREVIEW_CHARS).collect();
                format!("{cut}...")
            } else {
                chunk.content.clone()
            };
            SourceRef {
                chunk_index: chunk.chunk_index,
                preview,
                similarity: chunk.similarity,
            }
        })
        .collect()
}
