//! Text normalization between extraction and chunking.
//!
//! Extracted text arrives full of layout debris: page numbers, running
//! headers, inconsistent whitespace, compatibility codepoints. Normalization
//! strips artifacts first and collapses whitespace last, so a second pass
//! over already-normalized text is a no-op.

use std::sync::OnceLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

fn page_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bpage[ \t]+\d+\b").unwrap())
}

fn page_counter_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d+[ \t]*/[ \t]*\d+\b").unwrap())
}

fn header_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // a line of 3-50 uppercase letters and spaces is treated as a running header
    RE.get_or_init(|| Regex::new(r"(?m)^[A-Z][A-Z ]{2,49}$").unwrap())
}

fn space_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t]+").unwrap())
}

fn line_edge_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^ +| +$").unwrap())
}

fn blank_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").unwrap())
}

/// Normalize extracted text for chunking.
///
/// Steps, in order:
/// 1. Unicode NFKC normalization (folds ligatures and fullwidth forms).
/// 2. Line ending normalization to `\n`.
/// 3. Page artifact removal: `Page N` tokens and `N / M` counters.
/// 4. Space and tab runs collapsed to a single space, line edges trimmed.
/// 5. Running header removal (short all-uppercase lines).
/// 6. Blank line runs collapsed to one blank line, outer whitespace trimmed.
///
/// The function is idempotent: `normalize_text(normalize_text(s))` equals
/// `normalize_text(s)` for any input.
pub fn normalize_text(text: &str) -> String {
    let text: String = text.nfkc().collect();
    let text = text.replace("\r\n", "\n").replace('\r', "\n");

    let text = page_token_re().replace_all(&text, "");
    let text = page_counter_re().replace_all(&text, "");

    let text = space_run_re().replace_all(&text, " ");
    let text = line_edge_re().replace_all(&text, "");

    // runs after whitespace collapse so tab-separated headers are caught too
    let text = header_line_re().replace_all(&text, "");
    let text = blank_run_re().replace_all(&text, "\n\n");

    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_whitespace() {
        assert_eq!(normalize_text("a  b\t\tc"), "a b c");
    }

    #[test]
    fn test_collapses_blank_lines() {
        assert_eq!(normalize_text("a\n\n\n\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_removes_page_tokens() {
        assert_eq!(normalize_text("intro Page 3 outro"), "intro outro");
        assert_eq!(normalize_text("intro PAGE 12 outro"), "intro outro");
    }

    #[test]
    fn test_removes_page_counters() {
        assert_eq!(normalize_text("before 3 / 10 after"), "before after");
        assert_eq!(normalize_text("before 3/10 after"), "before after");
    }

    #[test]
    fn test_removes_uppercase_header_lines() {
        let input = "CONFIDENTIAL REPORT\nActual content here.";
        assert_eq!(normalize_text(input), "Actual content here.");
    }

    #[test]
    fn test_keeps_short_uppercase_tokens() {
        // two-letter lines and mixed-case lines are not headers
        assert_eq!(normalize_text("OK\nbody"), "OK\nbody");
        assert_eq!(normalize_text("Not A Header\nbody"), "Not A Header\nbody");
    }

    #[test]
    fn test_nfkc_folds_compatibility_forms() {
        // ﬁ ligature becomes "fi", fullwidth A becomes "A"
        assert_eq!(normalize_text("con\u{FB01}g \u{FF21}"), "config A");
    }

    #[test]
    fn test_crlf_normalized() {
        assert_eq!(normalize_text("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_trims_outer_whitespace() {
        assert_eq!(normalize_text("  \n body \n  "), "body");
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "Header Page 1\n\n\nBody  text 2/9 here.\r\nSECTION TITLE\nmore",
            "  plain   text  ",
            "",
            "a\n\n\nb Page 42 c\t\td",
            "ABC\tDEF\nbody",
        ];
        for input in inputs {
            let once = normalize_text(input);
            assert_eq!(normalize_text(&once), once, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize_text(""), "");
        assert_eq!(normalize_text("   \n\n  "), "");
    }
}
