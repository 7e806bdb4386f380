use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{Category, TrendLabel};

/// One named numeric observation exploded out of an analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub record_id: Uuid,
    pub name: String,
    pub category: Category,
    pub value: f64,
    pub unit: Option<String>,
    pub reference_range: Option<String>,
    pub is_abnormal: bool,
    pub observed_on: Option<NaiveDate>,
    pub extracted_at: NaiveDateTime,
    pub confidence: f64,
    /// Direction asserted by the inference service; never recomputed locally.
    pub trend: TrendLabel,
}

impl Measurement {
    /// Date used for every ordering: observation date, else the extraction date.
    pub fn effective_date(&self) -> NaiveDate {
        self.observed_on.unwrap_or_else(|| self.extracted_at.date())
    }
}
