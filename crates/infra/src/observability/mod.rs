//! In-process metrics
//!
//! [`SyncMetrics`] is the [`cohortsync_core::MetricsSink`] handed to every
//! core component; [`JobMetrics`] counts scheduler runs.

pub mod counters;

pub use counters::{JobMetrics, JobMetricsSnapshot, SyncMetrics};
