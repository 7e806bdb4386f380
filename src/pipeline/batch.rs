//! Batch ingestion.
//!
//! One request carries up to `MAX_BATCH_FILES` files and a single declared
//! record type. The request is validated as a whole before anything is
//! written; after that every file runs through [`DocumentProcessor`] on its
//! own and a failing file never affects its siblings.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::Instrument;
use uuid::Uuid;

use super::processor::{DocumentProcessor, FileOutcome, ProcessingError};
use crate::authorization::{resolve_owner, AuthorizationError, CurrentUser};
use crate::config::MAX_BATCH_FILES;
use crate::db::repository;
use crate::models::enums::RecordType;

/// One uploaded file as received from the caller.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    /// Declared MIME type, possibly empty or generic.
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Owner the files are uploaded for. `None` uploads for the caller.
    pub target_owner: Option<Uuid>,
    pub declared_type: RecordType,
    pub files: Vec<UploadFile>,
}

/// Whole-batch rejection. Raised before any file is processed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BatchError {
    #[error("No files were provided")]
    EmptyBatch,

    #[error("Too many files: {count} (maximum {max})")]
    TooManyFiles { count: usize, max: usize },

    #[error("User not found: {0}")]
    UserNotFound(Uuid),

    #[error(transparent)]
    Forbidden(#[from] AuthorizationError),

    #[error("Database error: {0}")]
    Database(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileFailure {
    pub file_name: String,
    pub kind: String,
    pub reason: String,
}

impl FileFailure {
    fn new(file_name: String, error: &ProcessingError) -> Self {
        Self {
            file_name,
            kind: error.kind().to_string(),
            reason: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    AllSucceeded,
    PartialSuccess,
    AllFailed,
}

/// Per-file results of one batch, each list in upload order.
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub owner_id: Uuid,
    pub success_count: usize,
    pub fail_count: usize,
    pub total: usize,
    pub successes: Vec<FileOutcome>,
    pub failures: Vec<FileFailure>,
}

impl BatchOutcome {
    pub fn status(&self) -> BatchStatus {
        if self.fail_count == 0 {
            BatchStatus::AllSucceeded
        } else if self.success_count == 0 {
            BatchStatus::AllFailed
        } else {
            BatchStatus::PartialSuccess
        }
    }
}

/// Runs batches against a shared processor with bounded fan-out.
#[derive(Clone)]
pub struct BatchCoordinator {
    processor: Arc<DocumentProcessor>,
    fanout: usize,
}

impl BatchCoordinator {
    pub fn new(processor: Arc<DocumentProcessor>, fanout: usize) -> Self {
        Self {
            processor,
            fanout: fanout.max(1),
        }
    }

    pub fn processor(&self) -> &Arc<DocumentProcessor> {
        &self.processor
    }

    /// Process every file of `request`.
    ///
    /// Dropping the returned future aborts in-flight files at their next await
    /// point. Files already committed stay committed.
    pub async fn upload(
        &self,
        uploader: &CurrentUser,
        request: UploadRequest,
    ) -> Result<BatchOutcome, BatchError> {
        let owner_id = self.validate(uploader, &request).await?;
        let total = request.files.len();
        let record_type = request.declared_type;

        tracing::info!(
            uploader = %uploader.id,
            owner_id = %owner_id,
            files = total,
            record_type = record_type.label(),
            "Batch upload started"
        );

        let file_names: Vec<String> = request.files.iter().map(|f| f.file_name.clone()).collect();
        let permits = Arc::new(Semaphore::new(self.fanout));
        let mut tasks = JoinSet::new();

        for (index, file) in request.files.into_iter().enumerate() {
            let processor = Arc::clone(&self.processor);
            let permits = Arc::clone(&permits);
            let uploader = *uploader;
            let span = tracing::debug_span!("batch_file", index);

            tasks.spawn(
                async move {
                    let result = match permits.acquire_owned().await {
                        Ok(_permit) => {
                            processor
                                .process_file(&uploader, owner_id, record_type, file)
                                .await
                        }
                        Err(_) => Err(ProcessingError::PersistenceError(
                            "batch scheduler closed".into(),
                        )),
                    };
                    (index, result)
                }
                .instrument(span),
            );
        }

        let mut results: Vec<Option<Result<FileOutcome, ProcessingError>>> = vec![None; total];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => tracing::error!(error = %e, "Batch file task aborted"),
            }
        }

        let mut successes = Vec::new();
        let mut failures = Vec::new();
        for (result, file_name) in results.into_iter().zip(file_names) {
            match result {
                Some(Ok(outcome)) => successes.push(outcome),
                Some(Err(e)) => failures.push(FileFailure::new(file_name, &e)),
                None => failures.push(FileFailure::new(
                    file_name,
                    &ProcessingError::PersistenceError("file task did not complete".into()),
                )),
            }
        }

        let outcome = BatchOutcome {
            owner_id,
            success_count: successes.len(),
            fail_count: failures.len(),
            total,
            successes,
            failures,
        };
        tracing::info!(
            success = outcome.success_count,
            failed = outcome.fail_count,
            total,
            "Batch upload finished"
        );
        Ok(outcome)
    }

    /// Size limits, owner resolution and existence checks. Read-only.
    async fn validate(
        &self,
        uploader: &CurrentUser,
        request: &UploadRequest,
    ) -> Result<Uuid, BatchError> {
        if request.files.is_empty() {
            return Err(BatchError::EmptyBatch);
        }
        if request.files.len() > MAX_BATCH_FILES {
            return Err(BatchError::TooManyFiles {
                count: request.files.len(),
                max: MAX_BATCH_FILES,
            });
        }

        let owner_id = resolve_owner(uploader, request.target_owner)?;

        let db = self.processor.database().clone();
        let uploader_id = uploader.id;
        let missing = tokio::task::spawn_blocking(move || {
            let conn = db.connect()?;
            for id in [owner_id, uploader_id] {
                if !repository::user_exists(&conn, &id)? {
                    return Ok(Some(id));
                }
            }
            Ok::<_, crate::db::DatabaseError>(None)
        })
        .await
        .map_err(|e| BatchError::Database(e.to_string()))?
        .map_err(|e| BatchError::Database(e.to_string()))?;

        match missing {
            Some(id) => {
                tracing::warn!(user_id = %id, "Batch rejected: unknown user");
                Err(BatchError::UserNotFound(id))
            }
            None => Ok(owner_id),
        }
    }
}
