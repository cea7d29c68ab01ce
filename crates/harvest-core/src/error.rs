//! Error types module
//!
//! Core error type shared by the store, organization and engine crates.
//! The `Database` variant and `From<sqlx::Error>` are gated behind the `sqlx` feature.

use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Expected conditions such as validation failures
    Debug,
    /// Recoverable issues
    Warn,
    /// Unexpected failures
    Error,
}

#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Organization not found: {0}")]
    OrganizationNotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl HarvestError {
    /// Whether retrying the same operation later may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            HarvestError::Database(_)
                | HarvestError::Internal(_)
                | HarvestError::InternalWithSource { .. }
        )
    }

    pub fn log_level(&self) -> LogLevel {
        match self {
            HarvestError::InvalidInput(_) | HarvestError::NotFound(_) => LogLevel::Debug,
            HarvestError::OrganizationNotFound(_) | HarvestError::Configuration(_) => {
                LogLevel::Warn
            }
            _ => LogLevel::Error,
        }
    }
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for HarvestError {
    fn from(err: SqlxError) -> Self {
        match err {
            SqlxError::RowNotFound => HarvestError::NotFound("row not found".to_string()),
            other => HarvestError::Database(other),
        }
    }
}

impl From<anyhow::Error> for HarvestError {
    fn from(err: anyhow::Error) -> Self {
        HarvestError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for HarvestError {
    fn from(err: io::Error) -> Self {
        HarvestError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for HarvestError {
    fn from(err: serde_json::Error) -> Self {
        HarvestError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

pub type HarvestResult<T> = Result<T, HarvestError>;
