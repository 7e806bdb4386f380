use serde::Serialize;

/// Outcome of turning one analysis into measurement rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NormalizationReport {
    pub stored: usize,
    /// Entries without a value.
    pub skipped_null: usize,
    /// Entries with a missing name, non-numeric value or bad date.
    pub skipped_malformed: usize,
}

impl NormalizationReport {
    pub fn skipped(&self) -> usize {
        self.skipped_null + self.skipped_malformed
    }
}
