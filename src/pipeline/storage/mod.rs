pub mod types;
pub mod normalize;
pub mod entity_store;

pub use types::*;
pub use normalize::*;
pub use entity_store::*;

use thiserror::Error;
use uuid::Uuid;

use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Record not found: {0}")]
    RecordNotFound(Uuid),
}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(DatabaseError::Sqlite(e))
    }
}
