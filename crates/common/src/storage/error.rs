//! Storage error types

use thiserror::Error;

use crate::error::{CommonError, ErrorClassification, ErrorSeverity};

/// Storage error type
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Database query error: {0}")]
    Query(String),

    #[error("Database migration error: {0}")]
    Migration(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Database pool exhausted")]
    PoolExhausted,

    #[error("Connection timeout after {0}s")]
    Timeout(u64),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Common(#[from] CommonError),

    #[error(transparent)]
    Rusqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    R2d2(#[from] r2d2::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

/// Storage result type
pub type StorageResult<T> = Result<T, StorageError>;

impl ErrorClassification for StorageError {
    /// SQLite BUSY/LOCKED, pool exhaustion and timeouts are transient.
    fn is_retryable(&self) -> bool {
        match self {
            Self::PoolExhausted | Self::Timeout(_) | Self::Connection(_) => true,
            Self::Rusqlite(err) => matches!(
                err.sqlite_error_code(),
                Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
            ),
            Self::Common(common_err) => common_err.is_retryable(),
            _ => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotFound(_) => ErrorSeverity::Info,
            Self::PoolExhausted | Self::Timeout(_) => ErrorSeverity::Warning,
            Self::Migration(_) => ErrorSeverity::Critical,
            Self::Common(common_err) => common_err.severity(),
            Self::Connection(_)
            | Self::Query(_)
            | Self::InvalidConfig(_)
            | Self::Rusqlite(_)
            | Self::R2d2(_)
            | Self::SerdeJson(_) => ErrorSeverity::Error,
        }
    }

    fn is_critical(&self) -> bool {
        matches!(self, Self::Migration(_))
            || matches!(self, Self::Common(err) if err.is_critical())
    }

    fn retry_after(&self) -> Option<std::time::Duration> {
        match self {
            Self::Common(common_err) => common_err.retry_after(),
            _ => None,
        }
    }
}

impl StorageError {
    /// Collapse `QueryReturnedNoRows` into [`StorageError::NotFound`].
    pub fn or_not_found(self, what: impl Into<String>) -> Self {
        match self {
            Self::Rusqlite(rusqlite::Error::QueryReturnedNoRows) => Self::NotFound(what.into()),
            other => other,
        }
    }
}
