//! Data handling for the Abada record browser
//!
//! Backing store access, schema introspection, the filter query builder and
//! the table browser built on them, plus the file formats the application
//! reads and writes (configuration, CSV export, HMM definitions, archived
//! analyses).

pub mod browser;
pub mod config;
pub mod export;
pub mod hmm;
pub mod query;
pub mod schema;
pub mod session;
pub mod sources;
pub mod store;

use arrow::error::ArrowError;
use rusqlite::ErrorCode;
use thiserror::Error;

// Re-exports
pub use browser::{DeletePreview, QueryResult, TableBrowser};
pub use config::AppConfig;
pub use export::{CsvExporter, ExportSummary};
pub use hmm::{HmmRegistry, ProfileModel};
pub use query::{AdHocQuery, FilterInput, Predicate, QueryBuilder};
pub use schema::{Column, ColumnType, SchemaCatalog, Table};
pub use session::{Session, SessionId};
pub use store::{BackingStore, Record, SqliteStore, Value};

/// Errors that can occur in data operations
#[derive(Error, Debug)]
pub enum DataError {
    /// User input could not be turned into a query
    #[error("Validation error: {0}")]
    Validation(String),

    /// The backing store refused an insert or delete
    #[error("Constraint error: {0}")]
    Constraint(String),

    /// A table or column that no longer exists
    #[error("Not found: {0}")]
    NotFound(String),

    /// Free-text query refused before parsing
    #[error("Query rejected: {0}")]
    GuardRejected(String),

    #[error("SQLite error: {0}")]
    Sqlite(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("HMM file line {line}: {message}")]
    HmmParse { line: usize, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Core(#[from] ab_core::CoreError),
}

impl From<rusqlite::Error> for DataError {
    fn from(error: rusqlite::Error) -> Self {
        match &error {
            rusqlite::Error::SqliteFailure(failure, message)
                if matches!(failure.code, ErrorCode::ConstraintViolation | ErrorCode::TypeMismatch) =>
            {
                DataError::Constraint(message.clone().unwrap_or_else(|| error.to_string()))
            }
            rusqlite::Error::SqliteFailure(_, Some(message))
                if message.starts_with("no such table") || message.starts_with("no such column") =>
            {
                DataError::NotFound(message.clone())
            }
            _ => DataError::Sqlite(error.to_string()),
        }
    }
}

impl From<csv::Error> for DataError {
    fn from(error: csv::Error) -> Self {
        match error.kind() {
            csv::ErrorKind::Io(io_err) => DataError::Io(std::io::Error::new(io_err.kind(), error.to_string())),
            _ => DataError::Csv(error.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
