//! Scheduling infrastructure for the background sync jobs
//!
//! - Genomics feed fetch
//! - Genomics batch publish
//! - Retry queue sweep
//!
//! Every job runs under a [`CronJobScheduler`] with explicit start/stop,
//! a per-run timeout and overlap protection.

pub mod cron_scheduler;
pub mod error;
pub mod jobs;

pub use cron_scheduler::{CronJobScheduler, CronSchedulerConfig, JobRun, ScheduledJob};
pub use error::{SchedulerError, SchedulerResult};
pub use jobs::{GenomicsFetchJob, GenomicsPublishJob, RetrySweepJob};
