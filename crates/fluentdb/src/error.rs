//! Error types for fluentdb

use crate::session::Operation;
use thiserror::Error;

/// Result type alias for fluentdb operations
pub type DbResult<T> = Result<T, DbError>;

/// Error types for statement building and database access
#[derive(Debug, Error)]
pub enum DbError {
    /// INSERT/UPDATE/DELETE without a target table
    #[error("Table name not informed")]
    MissingTableName,

    /// SELECT without a FROM clause
    #[error("FROM clause not informed for SELECT")]
    MissingFrom,

    /// A statement that needs a field list has none
    #[error("No fields informed for {0:?}")]
    MissingFields(Operation),

    /// Explicit aliases do not line up with the selected fields
    #[error("Number of fields ({fields}) differs from number of SQL aliases ({aliases})")]
    FieldAliasMismatch { fields: usize, aliases: usize },

    /// The active operation does not support the requested call
    #[error("Invalid operation for {action}: {operation:?}")]
    InvalidOperation {
        action: &'static str,
        operation: Operation,
    },

    /// Query execution error
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// The cursor has no data or no current row
    #[error("No data available: {0}")]
    NoData(String),

    /// Row decode error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// A record of a batch could not be bound
    #[error("{message}\r\n{record}")]
    Batch { message: String, record: String },

    /// Login timeout expired
    #[error("Login timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// The connectivity layer does not support the request
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl DbError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a "no data" error
    pub fn no_data(message: impl Into<String>) -> Self {
        Self::NoData(message.into())
    }

    pub(crate) fn invalid_operation(action: &'static str, operation: Operation) -> Self {
        Self::InvalidOperation { action, operation }
    }

    /// Check if this is the narrow "empty result" class single-row queries tolerate
    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NoData(_))
    }

    /// Check if this error was raised while compiling, before any statement was opened
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingTableName
                | Self::MissingFrom
                | Self::MissingFields(_)
                | Self::FieldAliasMismatch { .. }
                | Self::InvalidOperation { .. }
        )
    }
}
