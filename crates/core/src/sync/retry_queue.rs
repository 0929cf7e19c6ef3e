//! Change-detection gate and retry queue bookkeeping.

use std::sync::Arc;

use cohortsync_domain::{
    ChangeType, PendingChange, Result, SendDecision, SendOutcome, WriteMethod,
};
use tracing::{debug, instrument, warn};

use super::change_detection::ChangeDetector;
use super::ports::{SyncRetryRepository, SyncedSnapshotRepository};
use crate::metrics::{MetricsSink, SyncMetric};

/// Decides whether a write is needed and records how it went.
pub struct SyncRetryQueue {
    retries: Arc<dyn SyncRetryRepository>,
    snapshots: Arc<dyn SyncedSnapshotRepository>,
    detector: ChangeDetector,
    metrics: Arc<dyn MetricsSink>,
}

impl SyncRetryQueue {
    pub fn new(
        retries: Arc<dyn SyncRetryRepository>,
        snapshots: Arc<dyn SyncedSnapshotRepository>,
        detector: ChangeDetector,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self { retries, snapshots, detector, metrics }
    }

    /// `Send` unless the partner already confirmed an equivalent payload.
    #[instrument(skip(self, candidate))]
    pub async fn should_send(
        &self,
        subject_id: &str,
        change_type: ChangeType,
        candidate: &serde_json::Value,
    ) -> Result<SendDecision> {
        let Some(snapshot) = self.snapshots.get(subject_id, change_type).await? else {
            return Ok(SendDecision::Send);
        };

        if self.detector.differs(&snapshot.payload, candidate) {
            debug!(
                changed = ?self.detector.diff_paths(&snapshot.payload, candidate),
                "payload differs from last confirmed send"
            );
            Ok(SendDecision::Send)
        } else {
            Ok(SendDecision::Suppress)
        }
    }

    /// Apply the result of a send attempt to the snapshot and retry tables.
    ///
    /// Success overwrites the snapshot and then clears the retry entry.
    /// Failure and defer upsert the retry entry.
    #[instrument(skip(self, change), fields(subject_id = %change.subject_id, change_type = %change.change_type))]
    pub async fn record_outcome(&self, change: &PendingChange, outcome: &SendOutcome) -> Result<()> {
        match outcome {
            SendOutcome::Success => {
                self.snapshots.upsert(&change.subject_id, change.change_type, &change.body).await?;
                if self.retries.delete(&change.subject_id, change.change_type).await? {
                    self.metrics.incr(SyncMetric::RetryEntryCleared);
                }
                Ok(())
            }
            SendOutcome::Failed { reason } | SendOutcome::Deferred { reason } => {
                let payload = serde_json::to_string(change)?;
                let entry = self
                    .retries
                    .upsert_failure(&change.subject_id, change.change_type, &payload, Some(reason))
                    .await?;
                warn!(retry_count = entry.retry_count, reason = %reason, "partner write queued for retry");
                Ok(())
            }
        }
    }

    /// Method of the change still waiting in the retry queue for a key.
    ///
    /// An undecodable entry reads as `None`; the sweeper deals with it.
    pub async fn queued_method(
        &self,
        subject_id: &str,
        change_type: ChangeType,
    ) -> Result<Option<WriteMethod>> {
        let Some(entry) = self.retries.get(subject_id, change_type).await? else {
            return Ok(None);
        };
        Ok(serde_json::from_str::<PendingChange>(&entry.payload).ok().map(|queued| queued.method))
    }

    /// Drop the retry entry for a key without touching the snapshot.
    pub async fn clear(&self, subject_id: &str, change_type: ChangeType) -> Result<bool> {
        let removed = self.retries.delete(subject_id, change_type).await?;
        if removed {
            self.metrics.incr(SyncMetric::RetryEntryCleared);
        }
        Ok(removed)
    }
}
