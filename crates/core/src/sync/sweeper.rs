//! Replay of eligible retry entries.

use std::sync::Arc;

use cohortsync_domain::{PendingChange, Result, SyncRetryEntry};
use tracing::{error, info, instrument};

use super::ports::SyncRetryRepository;
use super::service::{SubmitResult, SyncService};
use crate::metrics::{MetricsSink, SyncMetric};

/// Tally of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub selected: usize,
    pub sent: usize,
    pub cleared: usize,
    pub failed: usize,
    pub deferred: usize,
    pub errors: usize,
}

/// Drains the retry queue through the live send path.
pub struct SyncRetrySweeper {
    retries: Arc<dyn SyncRetryRepository>,
    sync: Arc<SyncService>,
    metrics: Arc<dyn MetricsSink>,
    max_retry: i32,
    limit: usize,
}

impl SyncRetrySweeper {
    pub fn new(
        retries: Arc<dyn SyncRetryRepository>,
        sync: Arc<SyncService>,
        metrics: Arc<dyn MetricsSink>,
        max_retry: i32,
        limit: usize,
    ) -> Self {
        Self { retries, sync, metrics, max_retry, limit }
    }

    pub const fn max_retry(&self) -> i32 {
        self.max_retry
    }

    /// Replay every eligible entry once, oldest failure first.
    ///
    /// A failing entry is logged and counted; it never stops the sweep.
    #[instrument(skip(self), fields(max_retry = self.max_retry))]
    pub async fn run_once(&self) -> Result<SweepReport> {
        let entries = self.retries.list_eligible(self.max_retry, self.limit).await?;
        let mut report = SweepReport { selected: entries.len(), ..SweepReport::default() };

        for entry in &entries {
            match self.replay(entry).await {
                Ok(SubmitResult::Sent) => report.sent += 1,
                Ok(SubmitResult::Suppressed) => report.cleared += 1,
                Ok(SubmitResult::Failed { .. }) => report.failed += 1,
                Ok(SubmitResult::Deferred { .. }) => report.deferred += 1,
                Err(err) => {
                    report.errors += 1;
                    self.metrics.incr(SyncMetric::SweepReplayErrors);
                    error!(
                        subject_id = %entry.subject_id,
                        change_type = %entry.change_type,
                        retry_count = entry.retry_count,
                        error = %err,
                        "retry replay failed"
                    );
                }
            }
        }

        info!(
            selected = report.selected,
            sent = report.sent,
            cleared = report.cleared,
            failed = report.failed,
            deferred = report.deferred,
            errors = report.errors,
            "retry sweep finished"
        );
        Ok(report)
    }

    async fn replay(&self, entry: &SyncRetryEntry) -> Result<SubmitResult> {
        let change: PendingChange = match serde_json::from_str(&entry.payload) {
            Ok(change) => change,
            Err(err) => {
                // Count it so a corrupt payload eventually exhausts.
                self.retries
                    .upsert_failure(
                        &entry.subject_id,
                        entry.change_type,
                        &entry.payload,
                        Some(&format!("undecodable retry payload: {err}")),
                    )
                    .await?;
                return Err(err.into());
            }
        };

        // A suppressed replay clears its own entry inside `submit`.
        self.sync.submit(&change).await
    }
}
