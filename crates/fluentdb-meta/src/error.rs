//! Error types for fluentdb-meta

use fluentdb::DbError;
use thiserror::Error;

/// Result type for introspection operations.
pub type MetaResult<T> = Result<T, MetaError>;

/// Error type for introspection operations.
#[derive(Debug, Error)]
pub enum MetaError {
    /// Error raised by the connectivity layer.
    #[error("Database error: {0}")]
    Database(#[from] DbError),
    /// A metadata row is missing a value the introspector needs.
    #[error("Decode error for column '{column}': {message}")]
    Decode { column: String, message: String },
    /// JSON (de)serialization of tables and columns.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MetaError {
    /// Create a decode error.
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        MetaError::Decode {
            column: column.into(),
            message: message.into(),
        }
    }
}
