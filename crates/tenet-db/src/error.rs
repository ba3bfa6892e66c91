//! Database-specific error types and conversions.

use tenet_core::error::TenetError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Stored row could not be decoded: {0}")]
    Decode(String),

    #[error("Password hashing failed: {0}")]
    Hash(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },
}

impl From<DbError> for TenetError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => TenetError::NotFound { entity, id },
            other => TenetError::Unexpected(other.to_string()),
        }
    }
}
