//! Multi-format text extraction for uploaded documents (PDF, DOCX, TXT).
//!
//! Extraction dispatches on a [`FileFormat`] resolved once from the filename,
//! checks the size ceiling before any parsing work, and validates that the
//! result contains enough usable text.

use std::io::Read;

use crate::config::ExtractionConfig;
use crate::error::PipelineError;
use crate::models::FileFormat;

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Extract plain text from raw file bytes.
///
/// # Errors
///
/// - [`PipelineError::UnsupportedFileType`] for unrecognized extensions.
/// - [`PipelineError::FileTooLarge`] when `bytes` exceeds the configured
///   ceiling, checked before any parsing.
/// - [`PipelineError::ExtractionFailed`] when the underlying parser fails.
/// - [`PipelineError::EmptyDocument`] when the result has fewer than the
///   configured minimum of non-whitespace characters (guards image-only or
///   corrupt PDFs).
pub fn extract_text(
    bytes: &[u8],
    filename: &str,
    config: &ExtractionConfig,
) -> Result<String, PipelineError> {
    let format = FileFormat::from_filename(filename)
        .ok_or_else(|| PipelineError::UnsupportedFileType(filename.to_string()))?;

    if bytes.len() > config.max_file_bytes {
        return Err(PipelineError::FileTooLarge {
            actual: bytes.len(),
            limit: config.max_file_bytes,
        });
    }

    let text = match format {
        FileFormat::Pdf => extract_pdf(bytes)?,
        FileFormat::Docx => extract_docx(bytes)?,
        FileFormat::Text => extract_txt(bytes),
    };

    if non_whitespace_len(&text) < config.min_text_chars {
        return Err(PipelineError::EmptyDocument);
    }

    Ok(text)
}

/// Count characters that are not whitespace.
pub fn non_whitespace_len(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

fn extract_pdf(bytes: &[u8]) -> Result<String, PipelineError> {
    pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| PipelineError::ExtractionFailed(e.to_string()))
}

fn extract_docx(bytes: &[u8]) -> Result<String, PipelineError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| PipelineError::ExtractionFailed(e.to_string()))?;

    let mut doc_xml = Vec::new();
    let mut found = false;
    for i in 0..archive.len() {
        let entry = archive
            .by_index(i)
            .map_err(|e| PipelineError::ExtractionFailed(e.to_string()))?;
        if entry.name() == "word/document.xml" {
            entry
                .take(MAX_XML_ENTRY_BYTES)
                .read_to_end(&mut doc_xml)
                .map_err(|e| PipelineError::ExtractionFailed(e.to_string()))?;
            if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
                return Err(PipelineError::ExtractionFailed(
                    "word/document.xml exceeds size limit".to_string(),
                ));
            }
            found = true;
            break;
        }
    }
    if !found {
        return Err(PipelineError::ExtractionFailed(
            "word/document.xml not found".to_string(),
        ));
    }

    extract_paragraph_text(&doc_xml)
}

/// Walk `w:t` text runs in a DOCX body, separating `w:p` paragraphs with
/// blank lines.
fn extract_paragraph_text(xml: &[u8]) -> Result<String, PipelineError> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf)
                    {
                        out.push_str(te.unescape().unwrap_or_default().as_ref());
                    }
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"p" && !out.ends_with("\n\n") && !out.is_empty() {
                    out.push_str("\n\n");
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(PipelineError::ExtractionFailed(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out.trim_end().to_string())
}

/// Decode TXT bytes: strict UTF-8 first, then a latin-1 fallback.
fn extract_txt(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        // Latin-1 is total: every byte maps to a code point.
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ExtractionConfig {
        ExtractionConfig::default()
    }

    #[test]
    fn test_unsupported_extension() {
        let err = extract_text(b"hello world, enough text here", "image.png", &test_config())
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedFileType(_)));
    }

    #[test]
    fn test_size_guard_before_parsing() {
        let config = ExtractionConfig {
            max_file_bytes: 16,
            ..test_config()
        };
        // not a valid PDF, but the size guard must fire first
        let err = extract_text(&[0u8; 32], "big.pdf", &config).unwrap_err();
        assert!(matches!(err, PipelineError::FileTooLarge { actual: 32, limit: 16 }));
    }

    #[test]
    fn test_txt_utf8() {
        let text = extract_text("plain text document body".as_bytes(), "a.txt", &test_config())
            .unwrap();
        assert_eq!(text, "plain text document body");
    }

    #[test]
    fn test_txt_latin1_fallback() {
        // 0xE9 is 'é' in latin-1 and invalid as a standalone UTF-8 byte
        let mut bytes = b"r\xE9sum\xE9 with plenty of text".to_vec();
        bytes.extend_from_slice(b" and more");
        let text = extract_text(&bytes, "cv.txt", &test_config()).unwrap();
        assert!(text.starts_with("résumé"));
    }

    #[test]
    fn test_empty_document_guard() {
        let err = extract_text(b"   \n\t  hi ", "short.txt", &test_config()).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyDocument));
    }

    #[test]
    fn test_invalid_pdf_fails() {
        let err = extract_text(b"definitely not a pdf file at all", "x.pdf", &test_config())
            .unwrap_err();
        assert!(matches!(err, PipelineError::ExtractionFailed(_)));
    }

    #[test]
    fn test_invalid_docx_fails() {
        let err = extract_text(b"not a zip archive whatsoever!", "x.docx", &test_config())
            .unwrap_err();
        assert!(matches!(err, PipelineError::ExtractionFailed(_)));
    }

    #[test]
    fn test_docx_paragraphs_separated() {
        let xml = br#"<?xml version="1.0"?>
            <w:document xmlns:w="ns">
              <w:body>
                <w:p><w:r><w:t>First paragraph.</w:t></w:r></w:p>
                <w:p><w:r><w:t>Second paragraph.</w:t></w:r></w:p>
              </w:body>
            </w:document>"#;
        let text = extract_paragraph_text(xml).unwrap();
        assert_eq!(text, "First paragraph.\n\nSecond paragraph.");
    }

    #[test]
    fn test_non_whitespace_len() {
        assert_eq!(non_whitespace_len("  a b\tc\n"), 3);
        assert_eq!(non_whitespace_len(""), 0);
    }
}
