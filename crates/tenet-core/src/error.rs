//! Error types for the Tenet system.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TenetError {
    #[error("Bad request: {message}")]
    BadRequest { message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Unauthorized: {reason}")]
    Unauthorized { reason: String },

    #[error("Forbidden: {reason}")]
    Forbidden { reason: String },

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Internal error: {0}")]
    Unexpected(String),
}

impl TenetError {
    /// HTTP-equivalent status code for the routing layer to map onto responses.
    pub fn status(&self) -> u16 {
        match self {
            TenetError::BadRequest { .. } => 400,
            TenetError::Unauthorized { .. } => 401,
            TenetError::Forbidden { .. } => 403,
            TenetError::NotFound { .. } => 404,
            TenetError::Conflict { .. } => 409,
            TenetError::RateLimited => 429,
            TenetError::Unexpected(_) => 500,
        }
    }
}

pub type TenetResult<T> = Result<T, TenetError>;
