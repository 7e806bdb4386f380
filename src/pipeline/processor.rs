//! Per-record pipeline.
//!
//! Drives one uploaded file through extraction → classification → record
//! persistence → structured extraction → normalization, and owns the two
//! follow-up operations on a stored record: re-analysis and deletion.
//!
//! Blocking work (decoding, SQLite, file I/O) runs on the blocking pool with a
//! connection acquired per unit of work. The inference client is injected, so
//! the processor is fully testable with `MockInferenceClient`.

use std::path::Path;

use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use super::batch::UploadFile;
use super::classify::classify_document;
use super::extraction::{extract_text, ExtractionError};
use super::import::{compute_content_hash, normalize_content_type, sanitize_filename, FileStore};
use super::storage::{replace_analysis, NormalizationReport, StorageError};
use super::structuring::{StructuredExtractor, StructuringError};
use crate::authorization::{can_access_record, AuthorizationError, CurrentUser};
use crate::config::HISTORY_LIMIT;
use crate::db::{repository, Database, DatabaseError};
use crate::models::enums::RecordType;
use crate::models::{now_utc, Record};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProcessingError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Text extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("No inference service is configured")]
    InferenceUnavailable,

    #[error("Inference failed: {0}")]
    InferenceError(String),

    #[error("Malformed inference response: {0}")]
    MalformedResponse(String),

    #[error("Record not found: {0}")]
    RecordNotFound(Uuid),

    #[error("User not found: {0}")]
    UserNotFound(Uuid),

    #[error("Persistence error: {0}")]
    PersistenceError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl ProcessingError {
    /// Stable machine-readable code.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat(_) => "unsupported_format",
            Self::ExtractionFailed(_) => "extraction_failed",
            Self::InferenceUnavailable => "inference_unavailable",
            Self::InferenceError(_) => "inference_error",
            Self::MalformedResponse(_) => "malformed_response",
            Self::RecordNotFound(_) => "record_not_found",
            Self::UserNotFound(_) => "user_not_found",
            Self::PersistenceError(_) => "persistence_error",
            Self::Forbidden(_) => "forbidden",
        }
    }
}

impl From<ExtractionError> for ProcessingError {
    fn from(e: ExtractionError) -> Self {
        match e {
            ExtractionError::UnsupportedFormat(f) => Self::UnsupportedFormat(f),
            ExtractionError::ExtractionFailed(r) => Self::ExtractionFailed(r),
        }
    }
}

impl From<StructuringError> for ProcessingError {
    fn from(e: StructuringError) -> Self {
        match e {
            StructuringError::MalformedResponse(r) => Self::MalformedResponse(r),
            other => Self::InferenceError(other.to_string()),
        }
    }
}

impl From<DatabaseError> for ProcessingError {
    fn from(e: DatabaseError) -> Self {
        Self::PersistenceError(e.to_string())
    }
}

impl From<StorageError> for ProcessingError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::RecordNotFound(id) => Self::RecordNotFound(id),
            StorageError::Database(db) => db.into(),
        }
    }
}

impl From<AuthorizationError> for ProcessingError {
    fn from(e: AuthorizationError) -> Self {
        Self::Forbidden(e.to_string())
    }
}

impl From<std::io::Error> for ProcessingError {
    fn from(e: std::io::Error) -> Self {
        Self::PersistenceError(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// What happened to the structured-extraction stage of a stored record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisStatus {
    Completed { measurements: usize, skipped: usize },
    /// Inference skipped: the classifier found no lab content and
    /// `require_lab_signal` is set.
    NotLabReport,
    Failed { kind: String, reason: String },
}

/// A file that became a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileOutcome {
    pub record_id: Uuid,
    pub file_name: String,
    pub is_lab_report: bool,
    pub analysis: AnalysisStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReanalysisOutcome {
    pub record_id: Uuid,
    pub new_measurement_count: usize,
    pub skipped_entries: usize,
}

// ---------------------------------------------------------------------------
// Processor
// ---------------------------------------------------------------------------

pub struct DocumentProcessor {
    db: Database,
    files: FileStore,
    extractor: Option<StructuredExtractor>,
    require_lab_signal: bool,
}

impl DocumentProcessor {
    pub fn new(db: Database, files: FileStore, extractor: Option<StructuredExtractor>) -> Self {
        Self {
            db,
            files,
            extractor,
            require_lab_signal: false,
        }
    }

    /// Skip the inference call for documents the classifier does not flag.
    pub fn with_require_lab_signal(mut self, require: bool) -> Self {
        self.require_lab_signal = require;
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn inference_available(&self) -> bool {
        self.extractor.is_some()
    }

    /// Full pipeline for one uploaded file.
    ///
    /// Errors before the record exists (decoding, persistence) fail the file.
    /// Once the record is stored, inference-stage errors are reported in
    /// [`FileOutcome::analysis`] instead.
    pub async fn process_file(
        &self,
        uploader: &CurrentUser,
        owner_id: Uuid,
        record_type: RecordType,
        file: UploadFile,
    ) -> Result<FileOutcome, ProcessingError> {
        let span = tracing::info_span!("process_file", file = %file.file_name, owner_id = %owner_id);
        self.process_file_inner(uploader, owner_id, record_type, file)
            .instrument(span)
            .await
    }

    async fn process_file_inner(
        &self,
        uploader: &CurrentUser,
        owner_id: Uuid,
        record_type: RecordType,
        file: UploadFile,
    ) -> Result<FileOutcome, ProcessingError> {
        // Step 1: Decode
        let (file, text) = run_blocking(move || {
            let text = extract_text(&file.bytes, &file.content_type);
            Ok((file, text))
        })
        .await?;
        let text = text.inspect_err(|e| {
            tracing::warn!(error = %e, "Extraction failed");
        })?;

        // Step 2: Classify
        let classification = classify_document(&text);
        let is_lab_report = classification.is_lab_report();
        tracing::debug!(
            lab_matches = classification.lab_matches.len(),
            general_matches = classification.general_matches.len(),
            is_lab_report,
            "Document classified"
        );

        // Step 3: Persist bytes and record
        let record = self
            .store_record(uploader, owner_id, record_type, file, text, is_lab_report)
            .await?;
        tracing::info!(record_id = %record.id, "Record stored");

        // Step 4: Structured extraction + normalization
        let analysis = if self.require_lab_signal && !is_lab_report {
            tracing::info!(record_id = %record.id, "No lab signal, inference skipped");
            AnalysisStatus::NotLabReport
        } else {
            match self.analyze(&record).await {
                Ok(report) => AnalysisStatus::Completed {
                    measurements: report.stored,
                    skipped: report.skipped(),
                },
                Err(e) => {
                    tracing::warn!(record_id = %record.id, error = %e, "Analysis failed");
                    AnalysisStatus::Failed {
                        kind: e.kind().to_string(),
                        reason: e.to_string(),
                    }
                }
            }
        };

        Ok(FileOutcome {
            record_id: record.id,
            file_name: record.file_name,
            is_lab_report,
            analysis,
        })
    }

    async fn store_record(
        &self,
        uploader: &CurrentUser,
        owner_id: Uuid,
        record_type: RecordType,
        file: UploadFile,
        raw_text: String,
        is_lab_report: bool,
    ) -> Result<Record, ProcessingError> {
        let db = self.db.clone();
        let files = self.files.clone();
        let uploaded_by = uploader.id;

        run_blocking(move || {
            let record_id = Uuid::new_v4();
            let file_name = sanitize_filename(&file.file_name);
            let storage_path = files.stage_file(&owner_id, &record_id, &file_name, &file.bytes)?;

            let record = Record {
                id: record_id,
                owner_id,
                uploaded_by,
                file_name,
                content_type: normalize_content_type(&file.content_type),
                storage_path: storage_path.to_string_lossy().into_owned(),
                content_hash: compute_content_hash(&file.bytes),
                record_type,
                raw_text,
                is_lab_report,
                analysis_completed: false,
                uploaded_at: now_utc(),
            };

            let inserted = db
                .connect()
                .and_then(|conn| repository::insert_record(&conn, &record));
            if let Err(e) = inserted {
                // No row references these bytes
                if let Err(cleanup) = files.remove_staged(&storage_path) {
                    tracing::warn!(error = %cleanup, "Could not remove orphaned file");
                }
                return Err(e.into());
            }
            Ok(record)
        })
        .await
    }

    /// Run structured extraction for a stored record and replace its analysis.
    async fn analyze(&self, record: &Record) -> Result<NormalizationReport, ProcessingError> {
        let extractor = self
            .extractor
            .as_ref()
            .ok_or(ProcessingError::InferenceUnavailable)?;

        let db = self.db.clone();
        let owner_id = record.owner_id;
        let record_id = record.id;
        let history = run_blocking(move || {
            let conn = db.connect()?;
            Ok(repository::get_recent_measurements(
                &conn,
                &owner_id,
                Some(&record_id),
                HISTORY_LIMIT,
            )?)
        })
        .await?;

        let payload = extractor.extract(&record.id, &record.raw_text, &history).await?;

        let db = self.db.clone();
        run_blocking(move || {
            let mut conn = db.connect()?;
            Ok(replace_analysis(&mut conn, &record_id, &payload)?)
        })
        .await
    }

    async fn load_accessible_record(
        &self,
        user: &CurrentUser,
        record_id: Uuid,
    ) -> Result<Record, ProcessingError> {
        let db = self.db.clone();
        let record = run_blocking(move || {
            let conn = db.connect()?;
            Ok(repository::get_record(&conn, &record_id)?)
        })
        .await?;

        match record {
            Some(record) if can_access_record(user, &record) => Ok(record),
            Some(_) => {
                // Indistinguishable from a missing record for the caller
                tracing::warn!(user_id = %user.id, record_id = %record_id, "Record access denied");
                Err(ProcessingError::RecordNotFound(record_id))
            }
            None => Err(ProcessingError::RecordNotFound(record_id)),
        }
    }

    /// Re-run structured extraction from the stored text and replace the
    /// record's analysis. On any error the previous analysis stays in place.
    pub async fn reanalyze(
        &self,
        user: &CurrentUser,
        record_id: Uuid,
    ) -> Result<ReanalysisOutcome, ProcessingError> {
        let span = tracing::info_span!("reanalyze", record_id = %record_id);
        async {
            let record = self.load_accessible_record(user, record_id).await?;
            if !self.inference_available() {
                return Err(ProcessingError::InferenceUnavailable);
            }

            let report = self.analyze(&record).await?;
            tracing::info!(stored = report.stored, "Re-analysis complete");
            Ok(ReanalysisOutcome {
                record_id,
                new_measurement_count: report.stored,
                skipped_entries: report.skipped(),
            })
        }
        .instrument(span)
        .await
    }

    /// Delete a record with its analysis and measurements, then its stored
    /// bytes. Missing bytes are logged, not fatal.
    pub async fn delete_record(
        &self,
        user: &CurrentUser,
        record_id: Uuid,
    ) -> Result<(), ProcessingError> {
        let record = self.load_accessible_record(user, record_id).await?;

        let db = self.db.clone();
        let files = self.files.clone();
        run_blocking(move || {
            let mut conn = db.connect()?;
            repository::delete_record_cascade(&mut conn, &record.id).map_err(|e| match e {
                DatabaseError::NotFound { .. } => ProcessingError::RecordNotFound(record.id),
                other => other.into(),
            })?;

            if let Err(e) = files.remove_staged(Path::new(&record.storage_path)) {
                tracing::warn!(record_id = %record.id, error = %e, "Stored file could not be removed");
            }
            Ok(())
        })
        .await
    }
}

/// Run blocking work on the blocking pool.
pub(crate) async fn run_blocking<F, T>(f: F) -> Result<T, ProcessingError>
where
    F: FnOnce() -> Result<T, ProcessingError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ProcessingError::PersistenceError(format!("worker task failed: {e}")))?
}
