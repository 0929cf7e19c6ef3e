//! Genomics status feed types.

use serde::{Deserialize, Serialize};

use crate::impl_domain_status_conversions;

/// Processing state shared by payloads and batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Retry,
    Error,
    Complete,
}

impl_domain_status_conversions!(ProcessingStatus {
    Pending => "PENDING",
    Processing => "PROCESSING",
    Retry => "RETRY",
    Error => "ERROR",
    Complete => "COMPLETE",
});

impl ProcessingStatus {
    /// Statuses the publisher picks up on each tick.
    pub const PUBLISH_ELIGIBLE: [Self; 2] = [Self::Pending, Self::Error];
}

/// One fetch cycle of the partner status feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenomicsPayload {
    pub id: String,
    pub raw_payload: String,
    /// Cursor sent with the request.
    pub requested_timestamp: String,
    /// Cursor echoed by the feed for the following fetch.
    pub next_timestamp: String,
    pub record_count: i64,
    pub status: ProcessingStatus,
    pub created_on: i64,
}

/// A bounded slice of a payload's records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenomicsBatch {
    pub id: String,
    pub payload_id: String,
    /// JSON array holding this slice of the feed's `data`.
    pub batch_payload: String,
    /// Number of records actually in `batch_payload`.
    pub batch_size: i64,
    pub status: ProcessingStatus,
    pub retry_count: i32,
    pub error_details: Option<String>,
    pub created_on: i64,
    pub updated_on: i64,
}

/// Per-status batch counts for operators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub pending: i64,
    pub processing: i64,
    pub retry: i64,
    pub error: i64,
    pub complete: i64,
}

/// Body of the partner status feed.
///
/// Records stay as raw JSON until publish time so one malformed record only
/// holds back its own batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedResponse {
    pub data: Vec<serde_json::Value>,
    pub timestamp: String,
}

/// One record of the partner status feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenomicsStatusRecord {
    pub participant_id: String,
    pub status: String,
    pub module: String,
    #[serde(rename = "type")]
    pub record_type: String,
    #[serde(default)]
    pub appointment_id: Option<String>,
    #[serde(default)]
    pub decision: Option<String>,
}

/// Internal event emitted for each genomics status record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenomicsStatusEvent {
    /// Internal subject the partner participant resolves to.
    pub subject_id: String,
    pub partner_participant_id: String,
    pub status: String,
    pub module: String,
    pub record_type: String,
    pub appointment_id: Option<String>,
    pub decision: Option<String>,
    pub batch_id: String,
}
