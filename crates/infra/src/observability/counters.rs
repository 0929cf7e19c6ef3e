//! In-process counters for the sync engine and its scheduled jobs
//!
//! ## Design
//! - One `AtomicU64` per [`SyncMetric`], indexed by discriminant
//! - Relaxed ordering: counters are independent and only read for reporting
//! - Snapshots are plain maps so they can be logged or serialized as-is

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use cohortsync_core::{MetricsSink, SyncMetric};
use serde::Serialize;

/// Counter set implementing [`MetricsSink`].
#[derive(Debug)]
pub struct SyncMetrics {
    counters: [AtomicU64; SyncMetric::ALL.len()],
}

impl Default for SyncMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self { counters: std::array::from_fn(|_| AtomicU64::new(0)) }
    }

    /// Current value of one counter.
    pub fn get(&self, metric: SyncMetric) -> u64 {
        self.counters[metric as usize].load(Ordering::Relaxed)
    }

    /// All counters keyed by metric name.
    pub fn snapshot(&self) -> BTreeMap<&'static str, u64> {
        SyncMetric::ALL.iter().map(|metric| (metric.name(), self.get(*metric))).collect()
    }
}

impl MetricsSink for SyncMetrics {
    fn increment(&self, metric: SyncMetric, by: u64) {
        self.counters[metric as usize].fetch_add(by, Ordering::Relaxed);
    }
}

/// Run counters for one scheduled job.
#[derive(Debug, Default)]
pub struct JobMetrics {
    invoked: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    skipped: AtomicU64,
    last_duration_ms: AtomicU64,
}

/// Point-in-time copy of [`JobMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobMetricsSnapshot {
    pub invoked: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub skipped: u64,
    pub last_duration_ms: u64,
}

impl JobMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_invoked(&self) {
        self.invoked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self, elapsed: Duration) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
        self.record_duration(elapsed);
    }

    pub fn record_failure(&self, elapsed: Duration) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.record_duration(elapsed);
    }

    pub fn record_timeout(&self) {
        self.timed_out.fetch_add(1, Ordering::Relaxed);
    }

    /// A tick fired while the previous run was still in flight.
    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    fn record_duration(&self, elapsed: Duration) {
        let millis = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.last_duration_ms.store(millis, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> JobMetricsSnapshot {
        JobMetricsSnapshot {
            invoked: self.invoked.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            last_duration_ms: self.last_duration_ms.load(Ordering::Relaxed),
        }
    }
}
