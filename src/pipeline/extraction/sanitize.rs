/// Clean decoder output before it is stored or sent downstream.
/// Drops control characters (tabs and newlines survive), trims every line
/// and removes blank lines.
pub fn sanitize_extracted_text(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\t'))
        .collect::<String>()
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_null_bytes() {
        let clean = sanitize_extracted_text("Patient: Marie\x00Dubois");
        assert_eq!(clean, "Patient: MarieDubois");
    }

    #[test]
    fn strips_control_characters() {
        let clean = sanitize_extracted_text("Dose: 500mg\x01\x02\x03\nDate: 2024-01-15");
        assert_eq!(clean, "Dose: 500mg\nDate: 2024-01-15");
    }

    #[test]
    fn preserves_medical_symbols() {
        let raw = "Vitamin D: 30 µg/L (ref ≥ 20)\nTemp 37.5°C";
        assert_eq!(sanitize_extracted_text(raw), raw);
    }

    #[test]
    fn collapses_blank_lines_and_carriage_returns() {
        let clean = sanitize_extracted_text("  LDL 130\r\n\r\n\n   HDL 45  \r\n");
        assert_eq!(clean, "LDL 130\nHDL 45");
    }
}
