pub mod docx;
pub mod pdf;
pub mod sanitize;
pub mod text;

#[cfg(test)]
pub(crate) mod fixtures;

pub use docx::*;
pub use pdf::*;
pub use sanitize::*;
pub use text::*;

use thiserror::Error;

use crate::config::MAX_FILE_BYTES;
use crate::pipeline::import::{normalize_content_type, resolve_format, DocumentFormat};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Text extraction failed: {0}")]
    ExtractionFailed(String),
}

/// One decoder per document format.
pub trait DocumentDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<String, ExtractionError>;
}

fn decoder_for(format: DocumentFormat) -> &'static dyn DocumentDecoder {
    match format {
        DocumentFormat::Pdf => &PdfTextExtractor,
        DocumentFormat::Docx => &DocxTextExtractor,
        DocumentFormat::PlainText => &PlainTextExtractor,
    }
}

/// Decode document bytes to plain text.
///
/// The declared content type selects exactly one decoder; there is no fallback
/// to a second decoder when the first fails. Empty output is a failure.
pub fn extract_text(bytes: &[u8], content_type: &str) -> Result<String, ExtractionError> {
    if bytes.len() > MAX_FILE_BYTES {
        return Err(ExtractionError::ExtractionFailed(format!(
            "file too large: {:.1}MB exceeds {}MB limit",
            bytes.len() as f64 / (1024.0 * 1024.0),
            MAX_FILE_BYTES / (1024 * 1024)
        )));
    }

    let format = resolve_format(content_type, bytes).ok_or_else(|| {
        let normalized = normalize_content_type(content_type);
        ExtractionError::UnsupportedFormat(if normalized.is_empty() {
            "unknown".to_string()
        } else {
            normalized
        })
    })?;

    let raw = decoder_for(format).decode(bytes)?;
    let text = sanitize_extracted_text(&raw);
    if text.is_empty() {
        return Err(ExtractionError::ExtractionFailed(
            "document contains no extractable text".into(),
        ));
    }

    tracing::debug!(
        format = format.as_str(),
        chars = text.chars().count(),
        "Text extracted"
    );
    Ok(text)
}
