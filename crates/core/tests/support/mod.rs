//! Shared test helpers for `cohortsync-core` integration tests.
//!
//! In-memory implementations of every port so the engine can be exercised
//! without SQLite, HTTP or a bus.

#![allow(dead_code)]

pub mod clients;
pub mod repositories;

use std::sync::Arc;

use cohortsync_core::{
    ChangeDetector, MetricsSink, SyncMetric, SyncRetryQueue, SyncService,
};
use parking_lot::Mutex;
use std::collections::HashMap;

pub use clients::{MockFeedClient, MockPartnerWriter, RecordingPublisher};
pub use repositories::{
    InMemoryDirectory, InMemoryGenomicsStore, InMemoryRetryRepository, InMemorySnapshotRepository,
    InMemoryTrackingStore,
};

/// Metrics sink that remembers every increment.
#[derive(Default)]
pub struct CountingMetrics {
    counts: Mutex<HashMap<SyncMetric, u64>>,
}

impl CountingMetrics {
    pub fn get(&self, metric: SyncMetric) -> u64 {
        self.counts.lock().get(&metric).copied().unwrap_or(0)
    }
}

impl MetricsSink for CountingMetrics {
    fn increment(&self, metric: SyncMetric, by: u64) {
        *self.counts.lock().entry(metric).or_insert(0) += by;
    }
}

/// Fully wired send path over in-memory ports.
pub struct SyncHarness {
    pub retries: Arc<InMemoryRetryRepository>,
    pub snapshots: Arc<InMemorySnapshotRepository>,
    pub writer: Arc<MockPartnerWriter>,
    pub directory: Arc<InMemoryDirectory>,
    pub publisher: Arc<RecordingPublisher>,
    pub metrics: Arc<CountingMetrics>,
    pub service: Arc<SyncService>,
}

impl SyncHarness {
    pub fn new() -> Self {
        let retries = Arc::new(InMemoryRetryRepository::default());
        let snapshots = Arc::new(InMemorySnapshotRepository::default());
        let writer = Arc::new(MockPartnerWriter::default());
        let directory = Arc::new(InMemoryDirectory::default());
        let publisher = Arc::new(RecordingPublisher::default());
        let metrics = Arc::new(CountingMetrics::default());

        let queue = Arc::new(SyncRetryQueue::new(
            retries.clone(),
            snapshots.clone(),
            ChangeDetector::new(["updated_at", "occurred_at"]),
            metrics.clone(),
        ));
        let service = Arc::new(SyncService::new(
            queue,
            writer.clone(),
            directory.clone(),
            publisher.clone(),
            metrics.clone(),
        ));

        Self { retries, snapshots, writer, directory, publisher, metrics, service }
    }
}
