//! Overlapping, boundary-aware text chunking.
//!
//! Normalized text is split into pieces of at most `max_chars` characters.
//! Cuts prefer a paragraph break, then a sentence end, and only fall back to
//! a hard cut when neither appears in the second half of the window. Each
//! piece starts `overlap_chars` characters before the previous cut so that
//! context spanning a boundary survives in at least one chunk.

use uuid::Uuid;

use crate::config::ChunkingConfig;
use crate::models::Chunk;

/// Split `text` into chunks for `document_id`.
///
/// Chunk indices are contiguous from 0. Pieces that trim to nothing are
/// skipped without consuming an index. Text no longer than `max_chars`
/// yields a single chunk.
pub fn chunk_document(document_id: &str, text: &str, config: &ChunkingConfig) -> Vec<Chunk> {
    chunk_text(text, config.max_chars, config.overlap_chars)
        .into_iter()
        .enumerate()
        .map(|(index, content)| Chunk {
            id: Uuid::new_v4().to_string(),
            document_id: document_id.to_string(),
            chunk_index: index as i64,
            content,
        })
        .collect()
}

/// Split `text` into trimmed, non-empty chunk strings.
pub fn chunk_text(text: &str, max_chars: usize, overlap_chars: usize) -> Vec<String> {
    chunk_spans(text, max_chars, overlap_chars)
        .into_iter()
        .filter_map(|(start, end)| {
            let piece = text[start..end].trim();
            (!piece.is_empty()).then(|| piece.to_string())
        })
        .collect()
}

/// Compute the byte ranges of each chunk window.
///
/// Lengths and the overlap are measured in characters, not bytes. The
/// returned ranges always lie on char boundaries.
fn chunk_spans(text: &str, max_chars: usize, overlap_chars: usize) -> Vec<(usize, usize)> {
    // byte offset of every char, with a sentinel for the end of the text
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(b, _)| b)
        .chain(std::iter::once(text.len()))
        .collect();
    let total = offsets.len() - 1;

    let mut spans = Vec::new();
    let mut start = 0usize;
    while start < total {
        let mut end = (start + max_chars).min(total);
        if end < total {
            // prefer a natural boundary in the second half of the window
            let threshold = start + max_chars / 2;
            let window = &text[offsets[start]..offsets[end]];
            if let Some(cut) = find_cut(window, offsets[threshold] - offsets[start]) {
                end = start + text[offsets[start]..offsets[start] + cut].chars().count();
            }
        }
        spans.push((offsets[start], offsets[end]));
        if end == total {
            break;
        }
        // step back by the overlap, but always move forward: an early cut
        // can leave `end - overlap` at or before `start` (legal whenever
        // overlap > max_chars / 2), and the remaining text must still be
        // covered
        let next = end.saturating_sub(overlap_chars);
        start = if next > start {
            next
        } else {
            end.max(start + 1)
        };
    }
    spans
}

/// Find the best cut point within a window, as a byte offset into `window`.
///
/// A paragraph break wins over a sentence end; the cut lands before the
/// break but after the period. Returns `None` when no boundary falls at or
/// past `min_byte`.
fn find_cut(window: &str, min_byte: usize) -> Option<usize> {
    if let Some(pos) = window.rfind("\n\n") {
        if pos >= min_byte {
            return Some(pos);
        }
    }
    if let Some(pos) = window.rfind('.') {
        if pos >= min_byte {
            return Some(pos + 1);
        }
    }
    None
}
