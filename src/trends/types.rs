use serde::Serialize;

use crate::models::enums::{Category, RecordType};
use crate::models::Measurement;

/// All measurements sharing one normalized name, ascending by effective date.
#[derive(Debug, Clone, Serialize)]
pub struct TrendSeries {
    /// Name as written on the earliest point.
    pub name: String,
    pub points: Vec<Measurement>,
}

/// Series of every measurement taken from records of one declared type.
#[derive(Debug, Clone, Serialize)]
pub struct TrendGroup {
    pub record_type: RecordType,
    pub series: Vec<TrendSeries>,
}

impl TrendGroup {
    pub fn measurement_count(&self) -> usize {
        self.series.iter().map(|s| s.points.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCount {
    pub category: Category,
    pub color: String,
    pub count: usize,
}

/// Owner dashboard numbers.
#[derive(Debug, Clone, Serialize)]
pub struct TrendSummary {
    pub total: usize,
    pub abnormal: usize,
    /// `abnormal / total`, 0.0 when there are no measurements.
    pub abnormal_fraction: f64,
    /// Every fixed category in display order, zero-filled.
    pub by_category: Vec<CategoryCount>,
    /// Newest extractions inside the recent window.
    pub recent: Vec<Measurement>,
}
