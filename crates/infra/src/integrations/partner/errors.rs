//! Partner API error classification

use std::fmt;

use cohortsync_domain::CohortSyncError;
use reqwest::StatusCode;

/// Broad class of a partner failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartnerErrorCategory {
    /// Connect failure, timeout or other transport problem.
    Transport,
    /// 5xx from the partner.
    ServerUnavailable,
    /// 429 from the partner.
    RateLimited,
    /// 401 or 403.
    Authentication,
    /// Partner does not know the participant or order.
    NotFound,
    /// Any other 4xx; the payload itself was refused.
    Rejected,
    Unknown,
}

impl PartnerErrorCategory {
    /// Whether a later attempt with the same payload can succeed.
    pub const fn should_retry(self) -> bool {
        matches!(self, Self::Transport | Self::ServerUnavailable | Self::RateLimited)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::ServerUnavailable => "server_unavailable",
            Self::RateLimited => "rate_limited",
            Self::Authentication => "authentication",
            Self::NotFound => "not_found",
            Self::Rejected => "rejected",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PartnerErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified partner failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartnerError {
    category: PartnerErrorCategory,
    message: String,
}

impl PartnerError {
    pub fn new(category: PartnerErrorCategory, message: impl Into<String>) -> Self {
        Self { category, message: message.into() }
    }

    /// Classify a non-success response. `body` is truncated for the message.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let category = match status.as_u16() {
            401 | 403 => PartnerErrorCategory::Authentication,
            404 => PartnerErrorCategory::NotFound,
            429 => PartnerErrorCategory::RateLimited,
            400..=499 => PartnerErrorCategory::Rejected,
            500..=599 => PartnerErrorCategory::ServerUnavailable,
            _ => PartnerErrorCategory::Unknown,
        };

        let snippet: String = body.chars().take(200).collect();
        let reason = status.canonical_reason().unwrap_or("unknown status");
        let message = if snippet.trim().is_empty() {
            format!("HTTP {} {reason}", status.as_u16())
        } else {
            format!("HTTP {} {reason}: {}", status.as_u16(), snippet.trim())
        };

        Self::new(category, message)
    }

    /// Wrap an error raised before any response arrived.
    pub fn transport(err: &CohortSyncError) -> Self {
        let category = match err {
            CohortSyncError::Network(_) => PartnerErrorCategory::Transport,
            CohortSyncError::Auth(_) => PartnerErrorCategory::Authentication,
            _ => PartnerErrorCategory::Unknown,
        };
        Self::new(category, err.to_string())
    }

    pub const fn category(&self) -> PartnerErrorCategory {
        self.category
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn should_retry(&self) -> bool {
        self.category.should_retry()
    }
}

impl fmt::Display for PartnerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "partner {}: {}", self.category, self.message)
    }
}

impl std::error::Error for PartnerError {}

impl From<PartnerError> for CohortSyncError {
    fn from(err: PartnerError) -> Self {
        let message = err.to_string();
        match err.category {
            PartnerErrorCategory::Authentication => Self::Auth(message),
            PartnerErrorCategory::NotFound => Self::NotFound(message),
            PartnerErrorCategory::Rejected => Self::InvalidInput(message),
            PartnerErrorCategory::Transport
            | PartnerErrorCategory::ServerUnavailable
            | PartnerErrorCategory::RateLimited => Self::Network(message),
            PartnerErrorCategory::Unknown => Self::Internal(message),
        }
    }
}
