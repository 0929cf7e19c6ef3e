//! Common error types and classification.
//!
//! `CommonError` covers the failure patterns that show up in every layer
//! (timeouts, serialization, persistence, validation). Layer-specific errors
//! compose with it and implement [`ErrorClassification`] so retry and alerting
//! decisions are made the same way everywhere.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias for operations returning [`CommonError`].
pub type CommonResult<T> = Result<T, CommonError>;

/// Failure patterns shared across crates.
#[derive(Debug, Error)]
pub enum CommonError {
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout { operation: String, duration: Duration },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Persistence error: {message}")]
    Persistence { message: String, operation: Option<String> },

    #[error("Validation failed for '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after: Option<Duration> },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl CommonError {
    /// Create a timeout error for the named operation.
    pub fn timeout<S: Into<String>>(operation: S, duration: Duration) -> Self {
        Self::Timeout { operation: operation.into(), duration }
    }

    /// Create a serialization error.
    pub fn serialization<S: Into<String>>(message: S) -> Self {
        Self::Serialization { message: message.into() }
    }

    /// Create a persistence error.
    pub fn persistence<S: Into<String>>(message: S) -> Self {
        Self::Persistence { message: message.into(), operation: None }
    }

    /// Create a persistence error tagged with the failing operation.
    pub fn persistence_op<S: Into<String>, O: Into<String>>(operation: O, message: S) -> Self {
        Self::Persistence { message: message.into(), operation: Some(operation.into()) }
    }

    /// Create a validation error.
    pub fn validation<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self::Validation { field: field.into(), message: message.into() }
    }

    /// Create a configuration error.
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into() }
    }

    /// Create an internal error.
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal { message: message.into() }
    }
}

impl ErrorClassification for CommonError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::RateLimitExceeded { .. } | Self::Persistence { .. }
        )
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Timeout { .. } | Self::RateLimitExceeded { .. } => ErrorSeverity::Warning,
            Self::Serialization { .. }
            | Self::Persistence { .. }
            | Self::Validation { .. }
            | Self::Config { .. } => ErrorSeverity::Error,
            Self::Internal { .. } => ErrorSeverity::Critical,
        }
    }

    fn is_critical(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimitExceeded { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Standard interface for classifying errors by retryability and severity.
pub trait ErrorClassification {
    /// Check if this error is retryable
    ///
    /// Retryable errors are transient: timeouts, rate limiting, lock
    /// contention, temporary service unavailability.
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    fn is_critical(&self) -> bool;

    /// Get the suggested retry delay if applicable
    fn retry_after(&self) -> Option<Duration>;
}

/// Unified severity levels for monitoring and alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl From<serde_json::Error> for CommonError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(format!("JSON: {err}"))
    }
}

impl From<std::io::Error> for CommonError {
    fn from(err: std::io::Error) -> Self {
        Self::persistence(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_are_retryable_warnings() {
        let err = CommonError::timeout("partner_fetch", Duration::from_secs(30));
        assert!(err.is_retryable());
        assert_eq!(err.severity(), ErrorSeverity::Warning);
        assert!(!err.is_critical());
    }

    #[test]
    fn validation_is_not_retryable() {
        let err = CommonError::validation("identifier", "must not be empty");
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "Validation failed for 'identifier': must not be empty");
    }

    #[test]
    fn rate_limit_exposes_retry_after() {
        let err = CommonError::RateLimitExceeded { retry_after: Some(Duration::from_secs(7)) };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
    }

    #[test]
    fn internal_errors_are_critical() {
        assert!(CommonError::internal("invariant broken").is_critical());
        assert!(ErrorSeverity::Critical > ErrorSeverity::Error);
    }
}
