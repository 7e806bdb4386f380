use super::{DocumentDecoder, ExtractionError};

/// `text/plain` decoder. Input must be valid UTF-8; a leading BOM is dropped.
pub struct PlainTextExtractor;

impl DocumentDecoder for PlainTextExtractor {
    fn decode(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        let text = std::str::from_utf8(bytes).map_err(|e| {
            ExtractionError::ExtractionFailed(format!("text is not valid UTF-8: {e}"))
        })?;
        Ok(text.trim_start_matches('\u{feff}').to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_text_passes_through() {
        let text = PlainTextExtractor.decode("Hémoglobine 13,5 g/dL".as_bytes()).unwrap();
        assert_eq!(text, "Hémoglobine 13,5 g/dL");
    }

    #[test]
    fn bom_is_stripped() {
        let text = PlainTextExtractor.decode(b"\xEF\xBB\xBFTSH 2.1").unwrap();
        assert_eq!(text, "TSH 2.1");
    }

    #[test]
    fn invalid_utf8_fails() {
        let result = PlainTextExtractor.decode(&[0x66, 0xFF, 0xFE, 0x00]);
        assert!(matches!(result, Err(ExtractionError::ExtractionFailed(_))));
    }
}
