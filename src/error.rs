//! Error types for rowaudit operations

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuditError>;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Connectivity error: {message}")]
    Connectivity { message: String },

    #[error("Query error: {message}")]
    Query { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Commit error: {message}")]
    Commit { message: String },

    #[error("Scan of table '{table}' exceeded the {seconds}s timeout")]
    Timeout { table: String, seconds: u64 },

    #[error("Operation cancelled")]
    Cancelled,
}

impl AuditError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn connectivity(msg: impl Into<String>) -> Self {
        Self::Connectivity {
            message: msg.into(),
        }
    }

    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query {
            message: msg.into(),
        }
    }

    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
        }
    }

    pub fn commit(msg: impl Into<String>) -> Self {
        Self::Commit {
            message: msg.into(),
        }
    }

    /// Only connectivity failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connectivity { .. })
    }
}
