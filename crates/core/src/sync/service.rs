//! The single partner send path shared by live traffic and the sweeper.

use std::sync::Arc;

use chrono::Utc;
use cohortsync_domain::constants::TOPIC_PARTNER_SYNC_CONFIRMED;
use cohortsync_domain::{
    ChangeType, OutboundEvent, PendingChange, Result, SendDecision, SendOutcome,
    SyncConfirmedEvent, WriteMethod,
};
use tracing::{debug, info, instrument, warn};

use super::ports::{ParticipantDirectory, PartnerWriter};
use super::retry_queue::SyncRetryQueue;
use crate::events::EventPublisher;
use crate::metrics::{MetricsSink, SyncMetric};

/// Result of pushing one change through the send path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitResult {
    /// Partner accepted the write.
    Sent,
    /// Partner already holds an equivalent payload.
    Suppressed,
    /// Write failed; retry entry upserted.
    Failed { reason: String },
    /// Write not attempted yet; retry entry upserted.
    Deferred { reason: String },
}

/// Gate, write, record.
pub struct SyncService {
    queue: Arc<SyncRetryQueue>,
    writer: Arc<dyn PartnerWriter>,
    directory: Arc<dyn ParticipantDirectory>,
    events: Arc<dyn EventPublisher>,
    metrics: Arc<dyn MetricsSink>,
}

impl SyncService {
    pub fn new(
        queue: Arc<SyncRetryQueue>,
        writer: Arc<dyn PartnerWriter>,
        directory: Arc<dyn ParticipantDirectory>,
        events: Arc<dyn EventPublisher>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self { queue, writer, directory, events, metrics }
    }

    pub fn queue(&self) -> &Arc<SyncRetryQueue> {
        &self.queue
    }

    /// Push a change through the gate and, if needed, to the partner.
    ///
    /// Partner failures are recorded in the retry queue and reported as
    /// [`SubmitResult::Failed`]; only store errors surface as `Err`.
    #[instrument(skip(self, change), fields(subject_id = %change.subject_id, change_type = %change.change_type))]
    pub async fn submit(&self, change: &PendingChange) -> Result<SubmitResult> {
        let change = match self.resolve_target(change).await? {
            Some(resolved) => resolved,
            None => {
                let reason = "partner participant id not assigned yet".to_string();
                self.defer(change, &reason).await?;
                return Ok(SubmitResult::Deferred { reason });
            }
        };

        let change = self.keep_pending_create(change).await?;

        if self.queue.should_send(&change.subject_id, change.change_type, &change.body).await?
            == SendDecision::Suppress
        {
            // The partner holds this payload, so anything still queued is older.
            self.queue.clear(&change.subject_id, change.change_type).await?;
            self.metrics.incr(SyncMetric::PartnerSendSuppressed);
            return Ok(SubmitResult::Suppressed);
        }

        match self.writer.write(&change).await {
            Ok(()) => {
                self.queue.record_outcome(&change, &SendOutcome::Success).await?;
                self.metrics.incr(SyncMetric::PartnerSendSucceeded);
                info!(method = %change.method, target_id = %change.target_id, "partner write confirmed");
                self.publish_confirmation(&change).await;
                Ok(SubmitResult::Sent)
            }
            Err(err) => {
                let reason = err.to_string();
                self.queue.record_outcome(&change, &SendOutcome::failed(reason.clone())).await?;
                self.metrics.incr(SyncMetric::PartnerSendFailed);
                Ok(SubmitResult::Failed { reason })
            }
        }
    }

    /// Park a change in the retry queue without attempting a write.
    pub async fn defer(&self, change: &PendingChange, reason: &str) -> Result<()> {
        self.queue.record_outcome(change, &SendOutcome::deferred(reason)).await?;
        self.metrics.incr(SyncMetric::PartnerSendDeferred);
        Ok(())
    }

    /// Account changes are keyed by subject and need the partner id filled
    /// in; `None` means it is not known yet.
    async fn resolve_target(&self, change: &PendingChange) -> Result<Option<PendingChange>> {
        let needs_lookup = matches!(
            change.change_type,
            ChangeType::AccountProfile | ChangeType::ContactInfo
        ) && change.target_id.trim().is_empty();

        if !needs_lookup {
            return Ok(Some(change.clone()));
        }

        Ok(self
            .directory
            .partner_id_for_subject(&change.subject_id)
            .await?
            .map(|partner_id| PendingChange { target_id: partner_id, ..change.clone() }))
    }

    /// An order whose create is still queued must be created, not updated.
    async fn keep_pending_create(&self, change: PendingChange) -> Result<PendingChange> {
        if change.change_type != ChangeType::OrderTracking || change.method != WriteMethod::Put {
            return Ok(change);
        }

        match self.queue.queued_method(&change.subject_id, change.change_type).await? {
            Some(WriteMethod::Post) => {
                debug!(target_id = %change.target_id, "order create still queued; sending as POST");
                Ok(PendingChange { method: WriteMethod::Post, ..change })
            }
            _ => Ok(change),
        }
    }

    async fn publish_confirmation(&self, change: &PendingChange) {
        let confirmation = SyncConfirmedEvent {
            subject_id: change.subject_id.clone(),
            change_type: change.change_type,
            method: change.method,
            target_id: change.target_id.clone(),
            confirmed_on: Utc::now().timestamp_millis(),
        };

        let payload = match serde_json::to_value(&confirmation) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "failed to encode sync confirmation");
                return;
            }
        };

        let event =
            OutboundEvent::new(TOPIC_PARTNER_SYNC_CONFIRMED, change.subject_id.clone(), payload);
        match self.events.publish(event).await {
            Ok(()) => self.metrics.incr(SyncMetric::EventsPublished),
            Err(err) => warn!(error = %err, "failed to publish sync confirmation"),
        }
    }
}
