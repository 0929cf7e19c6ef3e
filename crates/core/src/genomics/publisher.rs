//! Turns eligible genomics batches into internal bus events.

use std::sync::Arc;

use cohortsync_domain::constants::TOPIC_GENOMICS_STATUS;
use cohortsync_domain::{
    CohortSyncError, GenomicsBatch, GenomicsStatusEvent, GenomicsStatusRecord, OutboundEvent,
    ProcessingStatus, Result,
};
use tracing::{error, info, instrument, warn};

use super::ports::GenomicsBatchStore;
use crate::events::EventPublisher;
use crate::metrics::{MetricsSink, SyncMetric};
use crate::sync::ports::ParticipantDirectory;

/// Tally of one publish tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub selected: usize,
    pub published: usize,
    pub skipped: usize,
    pub failed: usize,
    pub events: usize,
}

enum BatchOutcome {
    Published { events: usize },
    /// Nothing published and status untouched.
    Skipped,
    /// Publish started and failed; marked ERROR.
    Failed,
}

/// Publishes PENDING and ERROR batches, oldest first.
pub struct GenomicsBatchPublisher {
    batches: Arc<dyn GenomicsBatchStore>,
    directory: Arc<dyn ParticipantDirectory>,
    events: Arc<dyn EventPublisher>,
    metrics: Arc<dyn MetricsSink>,
}

impl GenomicsBatchPublisher {
    pub fn new(
        batches: Arc<dyn GenomicsBatchStore>,
        directory: Arc<dyn ParticipantDirectory>,
        events: Arc<dyn EventPublisher>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self { batches, directory, events, metrics }
    }

    /// Process every eligible batch; one batch failing never stops the rest.
    #[instrument(skip(self))]
    pub async fn run_once(&self) -> Result<PublishReport> {
        let eligible = self.batches.list_by_statuses(&ProcessingStatus::PUBLISH_ELIGIBLE, None).await?;
        let mut report = PublishReport { selected: eligible.len(), ..PublishReport::default() };

        for batch in &eligible {
            match self.process_batch(batch).await {
                Ok(BatchOutcome::Published { events }) => {
                    report.published += 1;
                    report.events += events;
                }
                Ok(BatchOutcome::Skipped) => report.skipped += 1,
                Ok(BatchOutcome::Failed) => report.failed += 1,
                Err(err) => {
                    report.failed += 1;
                    error!(batch_id = %batch.id, error = %err, "batch status update failed");
                }
            }
        }

        info!(
            selected = report.selected,
            published = report.published,
            skipped = report.skipped,
            failed = report.failed,
            events = report.events,
            "genomics publish finished"
        );
        Ok(report)
    }

    /// Close the loop on a handed-off batch: PROCESSING to COMPLETE.
    pub async fn acknowledge(&self, batch_id: &str) -> Result<()> {
        let batch = self.batches.get_batch(batch_id).await?;
        if batch.status != ProcessingStatus::Processing {
            return Err(CohortSyncError::InvalidInput(format!(
                "batch {batch_id} is {} and cannot be acknowledged",
                batch.status
            )));
        }
        self.batches.update_status(batch_id, ProcessingStatus::Complete, None).await
    }

    /// Put a batch back in front of the publisher.
    pub async fn requeue(&self, batch_id: &str) -> Result<()> {
        self.batches.get_batch(batch_id).await?;
        self.batches.update_status(batch_id, ProcessingStatus::Pending, None).await
    }

    async fn process_batch(&self, batch: &GenomicsBatch) -> Result<BatchOutcome> {
        let events = match self.map_batch(batch).await {
            Ok(events) => events,
            Err(err) => {
                self.metrics.incr(SyncMetric::BatchSkipped);
                warn!(
                    batch_id = %batch.id,
                    status = %batch.status,
                    error = %err,
                    "batch could not be mapped; left for next tick"
                );
                return Ok(BatchOutcome::Skipped);
            }
        };

        let count = events.len();
        for event in events {
            if let Err(err) = self.events.publish(event).await {
                self.metrics.incr(SyncMetric::BatchPublishFailed);
                error!(batch_id = %batch.id, error = %err, "publishing batch failed");
                self.batches
                    .update_status(&batch.id, ProcessingStatus::Error, Some(&err.to_string()))
                    .await?;
                return Ok(BatchOutcome::Failed);
            }
        }

        self.batches.update_status(&batch.id, ProcessingStatus::Processing, None).await?;
        self.metrics.incr(SyncMetric::BatchPublished);
        self.metrics.increment(SyncMetric::EventsPublished, count as u64);
        Ok(BatchOutcome::Published { events: count })
    }

    /// Decode and map every record before anything is published.
    async fn map_batch(&self, batch: &GenomicsBatch) -> Result<Vec<OutboundEvent>> {
        let records: Vec<GenomicsStatusRecord> = serde_json::from_str(&batch.batch_payload)?;

        let mut events = Vec::with_capacity(records.len());
        for record in records {
            let subject_id = self
                .directory
                .subject_for_partner_id(&record.participant_id)
                .await?
                .ok_or_else(|| {
                    CohortSyncError::NotFound(format!(
                        "no subject for partner participant {}",
                        record.participant_id
                    ))
                })?;

            let event = GenomicsStatusEvent {
                subject_id: subject_id.clone(),
                partner_participant_id: record.participant_id,
                status: record.status,
                module: record.module,
                record_type: record.record_type,
                appointment_id: record.appointment_id,
                decision: record.decision,
                batch_id: batch.id.clone(),
            };
            events.push(OutboundEvent::new(
                TOPIC_GENOMICS_STATUS,
                subject_id,
                serde_json::to_value(&event)?,
            ));
        }
        Ok(events)
    }
}
