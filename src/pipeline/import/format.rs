use std::path::Path;

use serde::{Deserialize, Serialize};

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_TEXT: &str = "text/plain";
pub const MIME_GENERIC: &str = "application/octet-stream";

/// Document formats we can decode. One decoder per format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    PlainText,
}

impl DocumentFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::PlainText => "plain_text",
        }
    }
}

/// Lowercase and strip parameters: `"Text/Plain; charset=UTF-8"` -> `"text/plain"`.
pub fn normalize_content_type(declared: &str) -> String {
    declared
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Select the decoder for a declared content type.
///
/// A generic or missing declaration is resolved once from magic bytes.
/// Returns `None` when no decoder applies.
pub fn resolve_format(declared: &str, bytes: &[u8]) -> Option<DocumentFormat> {
    match normalize_content_type(declared).as_str() {
        MIME_PDF => Some(DocumentFormat::Pdf),
        MIME_DOCX => Some(DocumentFormat::Docx),
        MIME_TEXT => Some(DocumentFormat::PlainText),
        "" | MIME_GENERIC => sniff_format(bytes),
        _ => None,
    }
}

/// Detect format from magic bytes (NOT file extensions).
fn sniff_format(bytes: &[u8]) -> Option<DocumentFormat> {
    match bytes {
        // PDF: starts with %PDF
        [0x25, 0x50, 0x44, 0x46, ..] => Some(DocumentFormat::Pdf),
        // ZIP container: PK\x03\x04 (DOCX is the only zip format we accept)
        [0x50, 0x4B, 0x03, 0x04, ..] => Some(DocumentFormat::Docx),
        _ => None,
    }
}

/// Declared type for a local file, from its extension. Unknown extensions are
/// declared generic and left to magic-byte detection.
pub fn content_type_for_path(path: &Path) -> &'static str {
    mime_guess::from_path(path).first_raw().unwrap_or(MIME_GENERIC)
}

/// Sanitize a filename: strip path components, limit length
pub fn sanitize_filename(original: &str) -> String {
    let name = Path::new(original.trim())
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document");

    let clean: String = name
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | '\0') && !c.is_control())
        .take(255)
        .collect();

    if clean.is_empty() || clean == "." || clean == ".." {
        "document".to_string()
    } else {
        clean
    }
}
