//! Document extractor collaborator.
//!
//! The core treats text extraction as opaque: bytes plus a declared MIME
//! type go in, cleaned UTF-8 text comes out. The built-in adapter handles
//! `text/plain` and `text/html`; binary formats (PDF, DOCX, RTF, ODT) are
//! satisfied by whatever implementation the host wires in, which may also
//! convert PDF footnotes into an appended Endnotes section when
//! `convert_footnotes` is set.

use crate::error::CaseStrainerError;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

/// MIME types the system accepts at the dispatcher.
pub const SUPPORTED_MIME: &[&str] = &[
    "text/plain",
    "application/pdf",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/rtf",
    "application/vnd.oasis.opendocument.text",
    "text/html",
];

/// Strip a MIME parameter list: `text/html; charset=utf-8` → `text/html`.
#[must_use]
pub fn base_mime(mime: &str) -> String {
    mime.split(';').next().unwrap_or(mime).trim().to_lowercase()
}

/// True when the declared MIME type is in the supported set.
#[must_use]
pub fn is_supported_mime(mime: &str) -> bool {
    SUPPORTED_MIME.contains(&base_mime(mime).as_str())
}

/// Turns document bytes into cleaned UTF-8 text.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    /// Extract cleaned text from `bytes` declared as `mime`.
    ///
    /// # Errors
    ///
    /// - `UnsupportedFormat` when `mime` is outside the supported set.
    /// - `Extraction` when decoding fails or no decoder is wired for the
    ///   format.
    async fn extract(
        &self,
        bytes: &[u8],
        mime: &str,
        convert_footnotes: bool,
    ) -> Result<String, CaseStrainerError>;
}

static SCRIPT_OR_STYLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)>").expect("script/style pattern")
});
static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]+>").expect("tag pattern"));

/// Minimal entity set seen in court-website HTML.
const ENTITIES: &[(&str, &str)] = &[
    ("&amp;", "&"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&apos;", "'"),
    ("&nbsp;", " "),
    ("&sect;", "\u{00A7}"),
];

/// Strip tags and decode entities from an HTML document.
#[must_use]
pub fn html_to_text(html: &str) -> String {
    let without_blocks = SCRIPT_OR_STYLE.replace_all(html, " ");
    let without_tags = HTML_TAG.replace_all(&without_blocks, " ");
    let mut text = without_tags.to_string();
    for (entity, plain) in ENTITIES {
        text = text.replace(entity, plain);
    }
    clean_text(&text)
}

/// Normalise line endings and collapse runs of horizontal whitespace. Line
/// structure is preserved because offsets into this text become the public
/// `start`/`end` fields.
#[must_use]
pub fn clean_text(raw: &str) -> String {
    let unified = raw.replace("\r\n", "\n").replace('\r', "\n");
    let mut out = String::with_capacity(unified.len());
    let mut in_space = false;
    for c in unified.chars() {
        if c == ' ' || c == '\t' {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            in_space = false;
            out.push(c);
        }
    }
    out.trim().to_string()
}

/// Built-in adapter: plain text and HTML. Binary formats report that no
/// decoder is wired rather than guessing at their contents.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinExtractor;

#[async_trait]
impl DocumentExtractor for BuiltinExtractor {
    async fn extract(
        &self,
        bytes: &[u8],
        mime: &str,
        _convert_footnotes: bool,
    ) -> Result<String, CaseStrainerError> {
        let base = base_mime(mime);
        if !is_supported_mime(&base) {
            return Err(CaseStrainerError::UnsupportedFormat { mime: base });
        }
        match base.as_str() {
            "text/plain" => {
                let text = std::str::from_utf8(bytes)
                    .map_err(|e| CaseStrainerError::Extraction(format!("invalid UTF-8: {e}")))?;
                Ok(clean_text(text))
            }
            "text/html" => {
                let html = String::from_utf8_lossy(bytes);
                Ok(html_to_text(&html))
            }
            other => Err(CaseStrainerError::Extraction(format!(
                "no decoder wired for {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(bytes: &[u8], mime: &str) -> Result<String, CaseStrainerError> {
        futures::executor::block_on(BuiltinExtractor.extract(bytes, mime, true))
    }

    #[test]
    fn plain_text_is_cleaned() {
        let text = extract(b"See  Smith v.\tJones,\r\n123 F.3d 456.", "text/plain").unwrap();
        assert_eq!(text, "See Smith v. Jones,\n123 F.3d 456.");
    }

    #[test]
    fn mime_parameters_are_ignored() {
        let text = extract(b"hello", "text/plain; charset=utf-8").unwrap();
        assert_eq!(text, "hello");
    }

    #[test]
    fn html_is_stripped_to_text() {
        let html = b"<html><head><style>p{}</style></head>\
                     <body><p>Smith v. Jones, 123 F.3d 456 &amp; more.</p>\
                     <script>var x = 1;</script></body></html>";
        let text = extract(html, "text/html").unwrap();
        assert!(text.contains("Smith v. Jones, 123 F.3d 456 & more."));
        assert!(!text.contains("var x"));
        assert!(!text.contains("p{}"));
    }

    #[test]
    fn unsupported_mime_is_rejected() {
        let err = extract(b"...", "image/png").unwrap_err();
        assert_eq!(err.code(), "unsupported_format");
    }

    #[test]
    fn supported_but_unwired_format_reports_extraction_error() {
        let err = extract(b"%PDF-1.7", "application/pdf").unwrap_err();
        assert_eq!(err.code(), "extraction_error");
    }

    #[test]
    fn invalid_utf8_reports_extraction_error() {
        let err = extract(&[0xff, 0xfe, 0x00], "text/plain").unwrap_err();
        assert_eq!(err.code(), "extraction_error");
    }
}
