//! Service facade.
//!
//! `CoreState` is built once from an [`AppConfig`] and owns the storage
//! handle, the file store, the inference client and the batch coordinator.
//! Interface layers (the CLI, tests) call its methods with an already
//! authenticated [`CurrentUser`]; nothing here is global.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::authorization::{resolve_owner, CurrentUser};
use crate::config::AppConfig;
use crate::db::{repository, Database, DatabaseError};
use crate::models::enums::Role;
use crate::models::{now_utc, Measurement, Record, User};
use crate::pipeline::batch::{BatchCoordinator, BatchError, BatchOutcome, UploadRequest};
use crate::pipeline::import::FileStore;
use crate::pipeline::processor::{
    run_blocking, DocumentProcessor, ProcessingError, ReanalysisOutcome,
};
use crate::pipeline::structuring::{
    InferenceClient, OllamaClient, StructuredExtractor, StructuringError,
};
use crate::trends::{self, TrendGroup, TrendSummary};

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Inference client error: {0}")]
    Inference(#[from] StructuringError),
}

pub struct CoreState {
    db: Database,
    processor: Arc<DocumentProcessor>,
    batches: BatchCoordinator,
}

impl CoreState {
    /// Open the database under `config.data_dir` and connect the configured
    /// inference endpoint, if any.
    pub fn new(config: AppConfig) -> Result<Self, CoreError> {
        let client = OllamaClient::from_config(&config)?;
        match &client {
            Some(c) => tracing::info!(model = c.model(), "Inference endpoint configured"),
            None => tracing::warn!("No inference endpoint configured; analysis is unavailable"),
        }
        Self::with_client(config, client.map(|c| Arc::new(c) as Arc<dyn InferenceClient>))
    }

    /// Same as [`CoreState::new`] with an injected inference client.
    pub fn with_client(
        config: AppConfig,
        client: Option<Arc<dyn InferenceClient>>,
    ) -> Result<Self, CoreError> {
        let db = Database::open(&config.database_path())?;
        let files = FileStore::new(config.files_dir());
        let extractor = client.map(|c| StructuredExtractor::new(c, config.inference_retries));

        let processor = Arc::new(
            DocumentProcessor::new(db.clone(), files, extractor)
                .with_require_lab_signal(config.require_lab_signal),
        );
        let batches = BatchCoordinator::new(Arc::clone(&processor), config.batch_fanout);

        tracing::info!(data_dir = %config.data_dir.display(), "Core state ready");
        Ok(Self {
            db,
            processor,
            batches,
        })
    }

    // ── Ingestion ─────────────────────────────────────────────

    pub async fn upload_batch(
        &self,
        user: &CurrentUser,
        request: UploadRequest,
    ) -> Result<BatchOutcome, BatchError> {
        self.batches.upload(user, request).await
    }

    pub async fn reanalyze(
        &self,
        user: &CurrentUser,
        record_id: Uuid,
    ) -> Result<ReanalysisOutcome, ProcessingError> {
        self.processor.reanalyze(user, record_id).await
    }

    pub async fn delete_record(
        &self,
        user: &CurrentUser,
        record_id: Uuid,
    ) -> Result<(), ProcessingError> {
        self.processor.delete_record(user, record_id).await
    }

    // ── Trend views ───────────────────────────────────────────

    pub async fn list_measurements(
        &self,
        user: &CurrentUser,
        owner: Option<Uuid>,
    ) -> Result<Vec<Measurement>, ProcessingError> {
        self.read(user, owner, |conn, owner| trends::list_measurements(conn, &owner))
            .await
    }

    pub async fn trend_by_name(
        &self,
        user: &CurrentUser,
        owner: Option<Uuid>,
        name: &str,
    ) -> Result<Vec<Measurement>, ProcessingError> {
        let name = name.to_string();
        self.read(user, owner, move |conn, owner| {
            trends::trend_by_name(conn, &owner, &name)
        })
        .await
    }

    pub async fn grouped_trend(
        &self,
        user: &CurrentUser,
        owner: Option<Uuid>,
    ) -> Result<Vec<TrendGroup>, ProcessingError> {
        self.read(user, owner, |conn, owner| trends::grouped_trend(conn, &owner))
            .await
    }

    pub async fn summary(
        &self,
        user: &CurrentUser,
        owner: Option<Uuid>,
    ) -> Result<TrendSummary, ProcessingError> {
        self.read(user, owner, |conn, owner| {
            trends::summary(conn, &owner, now_utc())
        })
        .await
    }

    /// Resolve the owner, then run `query` on its own connection off the runtime.
    async fn read<T, F>(
        &self,
        user: &CurrentUser,
        owner: Option<Uuid>,
        query: F,
    ) -> Result<T, ProcessingError>
    where
        T: Send + 'static,
        F: FnOnce(&rusqlite::Connection, Uuid) -> Result<T, DatabaseError> + Send + 'static,
    {
        let owner_id = resolve_owner(user, owner)?;
        let db = self.db.clone();
        run_blocking(move || {
            let conn = db.connect()?;
            Ok(query(&conn, owner_id)?)
        })
        .await
    }

    // ── Users and records ─────────────────────────────────────

    /// Create a user. Identity issuance lives elsewhere; this only seeds rows.
    pub async fn register_user(
        &self,
        display_name: &str,
        role: Role,
    ) -> Result<User, ProcessingError> {
        let user = User {
            id: Uuid::new_v4(),
            display_name: display_name.trim().to_string(),
            role,
            created_at: now_utc(),
        };
        let db = self.db.clone();
        let row = user.clone();
        run_blocking(move || {
            let conn = db.connect()?;
            repository::insert_user(&conn, &row)?;
            Ok(())
        })
        .await?;
        tracing::info!(user_id = %user.id, role = %user.role, "User registered");
        Ok(user)
    }

    /// Look up a user by id.
    pub async fn get_user(&self, user_id: Uuid) -> Result<User, ProcessingError> {
        let db = self.db.clone();
        run_blocking(move || {
            let conn = db.connect()?;
            repository::get_user(&conn, &user_id)?.ok_or(ProcessingError::UserNotFound(user_id))
        })
        .await
    }

    /// A record the caller may see. Foreign records read as missing.
    pub async fn get_record(
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

        record
            .filter(|r| crate::authorization::can_access_record(user, r))
            .ok_or(ProcessingError::RecordNotFound(record_id))
    }
}
