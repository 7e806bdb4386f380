use std::io::{Cursor, Read};
use std::sync::LazyLock;

use regex::Regex;

use super::{DocumentDecoder, ExtractionError};

const DOCUMENT_PART: &str = "word/document.xml";

/// Text runs, tabs, line breaks and paragraph ends in WordprocessingML.
static DOCX_TOKENS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<w:t(?:\s[^>]*)?>(.*?)</w:t>|<w:tab/>|<w:br\s*/>|</w:p>").unwrap()
});

static NUMERIC_ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#(x[0-9a-fA-F]+|[0-9]+);").unwrap());

/// DOCX extractor: reads the main document part out of the zip container
/// and concatenates its text runs, one line per paragraph.
pub struct DocxTextExtractor;

impl DocumentDecoder for DocxTextExtractor {
    fn decode(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| ExtractionError::ExtractionFailed(format!("invalid DOCX container: {e}")))?;

        let mut xml = String::new();
        archive
            .by_name(DOCUMENT_PART)
            .map_err(|e| ExtractionError::ExtractionFailed(format!("missing {DOCUMENT_PART}: {e}")))?
            .read_to_string(&mut xml)
            .map_err(|e| ExtractionError::ExtractionFailed(format!("unreadable {DOCUMENT_PART}: {e}")))?;

        Ok(document_xml_to_text(&xml))
    }
}

fn document_xml_to_text(xml: &str) -> String {
    let mut out = String::with_capacity(xml.len() / 4);
    for caps in DOCX_TOKENS.captures_iter(xml) {
        if let Some(run) = caps.get(1) {
            out.push_str(&unescape_xml(run.as_str()));
            continue;
        }
        match caps.get(0).map(|m| m.as_str()) {
            Some("<w:tab/>") => out.push('\t'),
            Some("</w:p>") => out.push('\n'),
            Some(_) => out.push('\n'),
            None => {}
        }
    }
    out
}

fn unescape_xml(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let numeric = NUMERIC_ENTITY.replace_all(s, |caps: &regex::Captures| {
        let code = &caps[1];
        let parsed = match code.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => code.parse::<u32>().ok(),
        };
        parsed
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_default()
    });
    // &amp; last so "&amp;lt;" stays "&lt;"
    numeric
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
