//! Internal event bus envelopes.

use serde::{Deserialize, Serialize};

use super::sync::{ChangeType, WriteMethod};
use super::tracking::TrackingEvent;

/// Message published on the internal bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundEvent {
    pub topic: String,
    /// Partition key; always the participant or subject identifier.
    pub key: String,
    pub payload: serde_json::Value,
}

impl OutboundEvent {
    pub fn new(topic: impl Into<String>, key: impl Into<String>, payload: serde_json::Value) -> Self {
        Self { topic: topic.into(), key: key.into(), payload }
    }
}

/// Account field change for a subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountUpdateEvent {
    pub subject_id: String,
    pub change_type: ChangeType,
    pub fields: serde_json::Value,
}

/// Everything the inbound consumer can receive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "event", rename_all = "snake_case")]
pub enum InboundEvent {
    Tracking(TrackingEvent),
    AccountUpdate(AccountUpdateEvent),
}

impl InboundEvent {
    /// Key that pins all events for one entity to one partition.
    pub fn partition_key(&self) -> &str {
        match self {
            Self::Tracking(event) => &event.identifier,
            Self::AccountUpdate(event) => &event.subject_id,
        }
    }
}

/// Published after the partner confirms a write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfirmedEvent {
    pub subject_id: String,
    pub change_type: ChangeType,
    pub method: WriteMethod,
    pub target_id: String,
    pub confirmed_on: i64,
}
