//! Scheduled wrappers around the core sync services

use std::sync::Arc;

use async_trait::async_trait;
use cohortsync_core::{GenomicsBatchPublisher, GenomicsFetchService, SyncRetrySweeper};
use cohortsync_domain::Result;
use tracing::info;

use super::cron_scheduler::ScheduledJob;

/// Pulls one page of the genomics status feed per tick.
pub struct GenomicsFetchJob {
    service: Arc<GenomicsFetchService>,
}

impl GenomicsFetchJob {
    pub fn new(service: Arc<GenomicsFetchService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ScheduledJob for GenomicsFetchJob {
    fn name(&self) -> &'static str {
        "genomics-fetch"
    }

    async fn run(&self) -> Result<()> {
        let report = self.service.run_once().await?;
        info!(records = report.records, batches = report.batches, outcome = ?report.outcome, "fetch tick done");
        Ok(())
    }
}

/// Publishes PENDING and ERROR batches to the bus.
pub struct GenomicsPublishJob {
    publisher: Arc<GenomicsBatchPublisher>,
}

impl GenomicsPublishJob {
    pub fn new(publisher: Arc<GenomicsBatchPublisher>) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl ScheduledJob for GenomicsPublishJob {
    fn name(&self) -> &'static str {
        "genomics-publish"
    }

    async fn run(&self) -> Result<()> {
        let report = self.publisher.run_once().await?;
        info!(selected = report.selected, published = report.published, "publish tick done");
        Ok(())
    }
}

/// Replays eligible retry entries.
pub struct RetrySweepJob {
    sweeper: Arc<SyncRetrySweeper>,
}

impl RetrySweepJob {
    pub fn new(sweeper: Arc<SyncRetrySweeper>) -> Self {
        Self { sweeper }
    }
}

#[async_trait]
impl ScheduledJob for RetrySweepJob {
    fn name(&self) -> &'static str {
        "retry-sweep"
    }

    async fn run(&self) -> Result<()> {
        let report = self.sweeper.run_once().await?;
        info!(selected = report.selected, sent = report.sent, failed = report.failed, "sweep tick done");
        Ok(())
    }
}
