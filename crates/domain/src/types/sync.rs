//! Partner write and retry queue types.

use serde::{Deserialize, Serialize};

use crate::impl_domain_status_conversions;

/// Kind of partner-side state a change targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
    AccountProfile,
    ContactInfo,
    OrderTracking,
}

impl_domain_status_conversions!(ChangeType {
    AccountProfile => "ACCOUNT_PROFILE",
    ContactInfo => "CONTACT_INFO",
    OrderTracking => "ORDER_TRACKING",
});

/// HTTP method used for a partner write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WriteMethod {
    Post,
    Put,
}

impl_domain_status_conversions!(WriteMethod {
    Post => "POST",
    Put => "PUT",
});

/// A partner write waiting to go through the change-detection gate.
///
/// This is also the serialized `payload` of a retry entry, so a replay
/// carries everything the live send had.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChange {
    /// Internal subject the change belongs to; first half of the retry key.
    pub subject_id: String,
    pub change_type: ChangeType,
    pub method: WriteMethod,
    /// Partner-side resource id (participant id or order id).
    pub target_id: String,
    pub body: serde_json::Value,
}

/// Result of the change-detection gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendDecision {
    Send,
    Suppress,
}

/// What happened to a partner write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Success,
    Failed { reason: String },
    Deferred { reason: String },
}

impl SendOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed { reason: reason.into() }
    }

    pub fn deferred(reason: impl Into<String>) -> Self {
        Self::Deferred { reason: reason.into() }
    }

    pub fn error_details(&self) -> Option<&str> {
        match self {
            Self::Success => None,
            Self::Failed { reason } | Self::Deferred { reason } => Some(reason),
        }
    }
}

/// Durable record of a failed or deferred partner write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRetryEntry {
    pub subject_id: String,
    pub change_type: ChangeType,
    /// Serialized [`PendingChange`].
    pub payload: String,
    pub retry_count: i32,
    pub error_details: Option<String>,
    pub created_on: i64,
    pub updated_on: i64,
}

/// Last payload the partner confirmed for a (subject, change type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncedSnapshot {
    pub subject_id: String,
    pub change_type: ChangeType,
    pub payload: serde_json::Value,
    pub updated_on: i64,
}

/// Mapping between an internal subject and its partner participant id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantLink {
    pub subject_id: String,
    pub partner_participant_id: String,
    pub updated_on: i64,
}
