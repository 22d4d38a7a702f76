//! Database error types.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("LanceDB error: {0}")]
    LanceDb(String),
    
    #[error("Arrow error: {0}")]
    Arrow(String),
    
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    
    #[error("Entity not found: {0}")]
    NotFound(String),
    
    #[error("Duplicate entry: {0}")]
    Duplicate(String),
    
    #[error("Invalid embedding dimension: expected {expected}, got {actual}")]
    InvalidEmbeddingDimension { expected: usize, actual: usize },
    
    #[error("Database not initialized")]
    NotInitialized,
    
    #[error("Table not found: {0}")]
    TableNotFound(String),
    
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

impl From<lancedb::Error> for DbError {
    fn from(err: lancedb::Error) -> Self {
        DbError::LanceDb(err.to_string())
    }
}

impl From<arrow_schema::ArrowError> for DbError {
    fn from(err: arrow_schema::ArrowError) -> Self {
        DbError::Arrow(err.to_string())
    }
}

/// Lets repositories that sit behind a `thoth_common` trait object (e.g.
/// `CacheStore`) surface failures as the shared abstract error kind.
impl From<DbError> for thoth_common::error::AppError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(msg) => thoth_common::error::AppError::NotFound(msg),
            DbError::Duplicate(msg) => thoth_common::error::AppError::Conflict(msg),
            DbError::InvalidEmbeddingDimension { expected, actual } => {
                thoth_common::error::AppError::SchemaViolation(format!("expected embedding dim {expected}, got {actual}"))
            }
            other => thoth_common::error::AppError::Transient(other.to_string()),
        }
    }
}
