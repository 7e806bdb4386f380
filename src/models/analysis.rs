use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{AnalysisKind, RiskLevel};

/// The current structured interpretation of a record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    pub id: Uuid,
    pub record_id: Uuid,
    pub owner_id: Uuid,
    pub kind: AnalysisKind,
    pub summary: String,
    /// Full structured payload as returned by the inference service (after repair).
    pub payload: serde_json::Value,
    pub risk_level: RiskLevel,
    pub confidence: f64,
    pub created_at: NaiveDateTime,
}
