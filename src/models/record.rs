use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::RecordType;

/// One uploaded document and the text extracted from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: Uuid,
    pub owner_id: Uuid,
    /// Differs from `owner_id` for administrator-initiated uploads.
    pub uploaded_by: Uuid,
    pub file_name: String,
    pub content_type: String,
    pub storage_path: String,
    /// Base64 SHA-256 of the uploaded bytes.
    pub content_hash: String,
    pub record_type: RecordType,
    #[serde(skip_serializing, default)]
    pub raw_text: String,
    pub is_lab_report: bool,
    pub analysis_completed: bool,
    pub uploaded_at: NaiveDateTime,
}
