use std::panic::{self, AssertUnwindSafe};

use super::{DocumentDecoder, ExtractionError};

/// PDF text extractor using the pdf-extract crate.
/// Handles digital PDFs with embedded text layers; scanned pages yield no text.
pub struct PdfTextExtractor;

impl DocumentDecoder for PdfTextExtractor {
    fn decode(&self, pdf_bytes: &[u8]) -> Result<String, ExtractionError> {
        // pdf-extract panics on some malformed inputs instead of returning an error
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem(pdf_bytes)
        }));

        match result {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(ExtractionError::ExtractionFailed(format!(
                "PDF parsing failed: {e}"
            ))),
            Err(_) => Err(ExtractionError::ExtractionFailed(
                "PDF decoder aborted on malformed input".into(),
            )),
        }
    }
}
