//! Metrics sink port.
//!
//! Components receive an `Arc<dyn MetricsSink>` at construction; there are no
//! process-wide counters.

/// Counters emitted by the synchronization engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncMetric {
    TrackingAccepted,
    TrackingRejected,
    PartnerSendSucceeded,
    PartnerSendFailed,
    PartnerSendSuppressed,
    PartnerSendDeferred,
    RetryEntryCleared,
    FeedFetchSucceeded,
    FeedFetchFailed,
    BatchesCreated,
    BatchPublished,
    BatchPublishFailed,
    BatchSkipped,
    EventsPublished,
    SweepReplayErrors,
}

impl SyncMetric {
    /// Every metric, for sinks that pre-register counters.
    pub const ALL: [Self; 15] = [
        Self::TrackingAccepted,
        Self::TrackingRejected,
        Self::PartnerSendSucceeded,
        Self::PartnerSendFailed,
        Self::PartnerSendSuppressed,
        Self::PartnerSendDeferred,
        Self::RetryEntryCleared,
        Self::FeedFetchSucceeded,
        Self::FeedFetchFailed,
        Self::BatchesCreated,
        Self::BatchPublished,
        Self::BatchPublishFailed,
        Self::BatchSkipped,
        Self::EventsPublished,
        Self::SweepReplayErrors,
    ];

    /// Stable metric name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::TrackingAccepted => "tracking.accepted",
            Self::TrackingRejected => "tracking.rejected",
            Self::PartnerSendSucceeded => "partner.send.succeeded",
            Self::PartnerSendFailed => "partner.send.failed",
            Self::PartnerSendSuppressed => "partner.send.suppressed",
            Self::PartnerSendDeferred => "partner.send.deferred",
            Self::RetryEntryCleared => "retry.entry.cleared",
            Self::FeedFetchSucceeded => "genomics.fetch.succeeded",
            Self::FeedFetchFailed => "genomics.fetch.failed",
            Self::BatchesCreated => "genomics.batches.created",
            Self::BatchPublished => "genomics.batch.published",
            Self::BatchPublishFailed => "genomics.batch.publish_failed",
            Self::BatchSkipped => "genomics.batch.skipped",
            Self::EventsPublished => "bus.events.published",
            Self::SweepReplayErrors => "retry.sweep.errors",
        }
    }
}

/// Destination for engine counters.
pub trait MetricsSink: Send + Sync {
    /// Add `by` to the named counter.
    fn increment(&self, metric: SyncMetric, by: u64);

    /// Add one to the named counter.
    fn incr(&self, metric: SyncMetric) {
        self.increment(metric, 1);
    }
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn increment(&self, _metric: SyncMetric, _by: u64) {}
}
