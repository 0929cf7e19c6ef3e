//! Application context - dependency injection container

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use cohortsync_core::{
    AccountChangeProcessor, ChangeDetector, EventPublisher, GenomicsBatchPublisher,
    GenomicsBatchStore as GenomicsBatchStorePort, GenomicsFetchService, MetricsSink,
    OrderTrackingStore as OrderTrackingStorePort, ParticipantDirectory as ParticipantDirectoryPort,
    SyncRetryQueue, SyncRetryRepository as SyncRetryRepositoryPort, SyncRetrySweeper, SyncService,
    TrackingEventGuard, TrackingEventProcessor,
};
use cohortsync_domain::{CohortSyncError, Config, Result};
use cohortsync_infra::events::{InProcessEventBus, InboundDispatcher, SyncInboundHandler};
use cohortsync_infra::scheduling::{
    CronJobScheduler, CronSchedulerConfig, GenomicsFetchJob, GenomicsPublishJob, RetrySweepJob,
    ScheduledJob,
};
use cohortsync_infra::{
    DbManager, PartnerClient, SqliteGenomicsRepository, SqliteOrderTrackingStore,
    SqliteParticipantDirectory, SqliteSyncRetryRepository, SqliteSyncedSnapshotRepository,
    SyncMetrics,
};
use tracing::{error, info, warn};

/// Type alias for genomics batch store port trait object
type DynGenomicsBatchStorePort = dyn GenomicsBatchStorePort + Send + Sync + 'static;

/// Type alias for order tracking store port trait object
type DynOrderTrackingStorePort = dyn OrderTrackingStorePort + Send + Sync + 'static;

/// Type alias for retry repository port trait object
type DynSyncRetryRepositoryPort = dyn SyncRetryRepositoryPort + Send + Sync + 'static;

/// Type alias for participant directory port trait object
type DynParticipantDirectoryPort = dyn ParticipantDirectoryPort + Send + Sync + 'static;

/// Bound on each scheduler start.
const SCHEDULER_START_TIMEOUT: Duration = Duration::from_secs(10);

/// Time the dispatcher gets to drain queued events on shutdown.
const DISPATCHER_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Application context - holds all services and dependencies
pub struct AppContext {
    // Core services
    pub config: Config,
    pub db: Arc<DbManager>,
    pub metrics: Arc<SyncMetrics>,
    pub bus: Arc<InProcessEventBus>,
    pub partner: Arc<PartnerClient>,

    // Persistence ports
    pub genomics: Arc<DynGenomicsBatchStorePort>,
    pub tracking_store: Arc<DynOrderTrackingStorePort>,
    pub retries: Arc<DynSyncRetryRepositoryPort>,
    pub directory: Arc<DynParticipantDirectoryPort>,

    // Engine
    pub sync: Arc<SyncService>,
    pub fetch: Arc<GenomicsFetchService>,
    pub publisher: Arc<GenomicsBatchPublisher>,
    pub sweeper: Arc<SyncRetrySweeper>,
    pub tracking: Arc<TrackingEventProcessor>,
    pub accounts: Arc<AccountChangeProcessor>,

    schedulers: Vec<CronJobScheduler>,
    dispatcher: Option<InboundDispatcher>,
}

impl AppContext {
    /// Wire every component. Nothing runs until [`AppContext::start`].
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;

        if let Some(parent) = config.database.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| {
                    CohortSyncError::Config(format!(
                        "cannot create database directory {}: {err}",
                        parent.display()
                    ))
                })?;
            }
        }

        let db = Arc::new(DbManager::new(&config.database.path, config.database.pool_size)?);
        db.run_migrations()?;
        db.health_check()?;

        let metrics = Arc::new(SyncMetrics::new());
        let metrics_sink: Arc<dyn MetricsSink> = metrics.clone();
        let bus = Arc::new(InProcessEventBus::new(config.dispatch.channel_capacity));
        let events: Arc<dyn EventPublisher> = bus.clone();
        let partner = Arc::new(PartnerClient::new(&config.partner)?);

        let genomics_repo = Arc::new(SqliteGenomicsRepository::new(db.clone()));
        let tracking_store: Arc<DynOrderTrackingStorePort> =
            Arc::new(SqliteOrderTrackingStore::new(db.clone()));
        let retries: Arc<DynSyncRetryRepositoryPort> =
            Arc::new(SqliteSyncRetryRepository::new(db.clone()));
        let directory: Arc<DynParticipantDirectoryPort> =
            Arc::new(SqliteParticipantDirectory::new(db.clone()));
        let snapshots = Arc::new(SqliteSyncedSnapshotRepository::new(db.clone()));

        let queue = Arc::new(SyncRetryQueue::new(
            retries.clone(),
            snapshots,
            ChangeDetector::new(config.change_detection.ignored_fields.iter().map(String::as_str)),
            metrics_sink.clone(),
        ));
        let sync = Arc::new(SyncService::new(
            queue,
            partner.clone(),
            directory.clone(),
            events.clone(),
            metrics_sink.clone(),
        ));

        let fetch = Arc::new(GenomicsFetchService::new(
            partner.clone(),
            genomics_repo.clone(),
            metrics_sink.clone(),
            config.genomics.batch_size,
        ));
        let publisher = Arc::new(GenomicsBatchPublisher::new(
            genomics_repo.clone(),
            directory.clone(),
            events,
            metrics_sink.clone(),
        ));
        let sweeper = Arc::new(SyncRetrySweeper::new(
            retries.clone(),
            sync.clone(),
            metrics_sink.clone(),
            config.retry.max_retry,
            config.retry.sweep_limit,
        ));
        let tracking = Arc::new(TrackingEventProcessor::new(
            TrackingEventGuard::new(tracking_store.clone(), metrics_sink),
            tracking_store.clone(),
            sync.clone(),
        ));
        let accounts = Arc::new(AccountChangeProcessor::new(sync.clone()));

        let schedulers = vec![
            build_scheduler(
                &config.genomics.fetch_cron,
                Arc::new(GenomicsFetchJob::new(fetch.clone())),
            )
            .await?,
            build_scheduler(
                &config.genomics.publish_cron,
                Arc::new(GenomicsPublishJob::new(publisher.clone())),
            )
            .await?,
            build_scheduler(&config.retry.sweep_cron, Arc::new(RetrySweepJob::new(sweeper.clone())))
                .await?,
        ];

        info!(db_path = %db.path().display(), "application context ready");

        Ok(Self {
            config,
            db,
            metrics,
            bus,
            partner,
            genomics: genomics_repo,
            tracking_store,
            retries,
            directory,
            sync,
            fetch,
            publisher,
            sweeper,
            tracking,
            accounts,
            schedulers,
            dispatcher: None,
        })
    }

    /// Start the cron schedulers and the inbound dispatcher.
    pub async fn start(&mut self) -> Result<()> {
        if self.dispatcher.is_some() {
            return Err(CohortSyncError::InvalidInput("application already started".into()));
        }

        for scheduler in &mut self.schedulers {
            let job = scheduler.job_name();
            // Start the scheduler with timeout (fail-fast initialization)
            tokio::time::timeout(SCHEDULER_START_TIMEOUT, scheduler.start())
                .await
                .map_err(|_| {
                    error!(job, timeout_secs = SCHEDULER_START_TIMEOUT.as_secs(), "scheduler start timed out");
                    CohortSyncError::Internal(format!("scheduler {job} start timed out"))
                })??;
        }

        let handler = Arc::new(SyncInboundHandler::new(self.tracking.clone(), self.accounts.clone()));
        self.dispatcher = Some(InboundDispatcher::start(&self.config.dispatch, handler));

        info!(schedulers = self.schedulers.len(), "application started");
        Ok(())
    }

    /// The running dispatcher.
    pub fn dispatcher(&self) -> Result<&InboundDispatcher> {
        self.dispatcher
            .as_ref()
            .ok_or_else(|| CohortSyncError::InvalidInput("application not started".into()))
    }

    /// Names of the registered scheduled jobs.
    pub fn job_names(&self) -> Vec<&'static str> {
        self.schedulers.iter().map(CronJobScheduler::job_name).collect()
    }

    /// Stop schedulers, drain the dispatcher and log final counters.
    pub async fn shutdown(mut self) -> Result<()> {
        info!("shutdown called on AppContext");

        for scheduler in &mut self.schedulers {
            if !scheduler.is_running() {
                continue;
            }
            let job = scheduler.job_name();
            if let Err(err) = scheduler.stop().await {
                warn!(job, error = %err, "scheduler stop failed");
            }
            let runs = scheduler.metrics();
            info!(job, invoked = runs.invoked, failed = runs.failed, skipped = runs.skipped, "scheduler stopped");
        }

        if let Some(dispatcher) = self.dispatcher.take() {
            let stats = dispatcher.stats();
            dispatcher.shutdown(DISPATCHER_DRAIN_TIMEOUT).await;
            info!(handled = stats.handled(), failed = stats.failed(), "dispatcher stopped");
        }

        for (name, value) in self.metrics.snapshot() {
            info!(metric = name, value, "final counter");
        }

        Ok(())
    }
}

async fn build_scheduler(cron: &str, job: Arc<dyn ScheduledJob>) -> Result<CronJobScheduler> {
    let scheduler = CronJobScheduler::with_config(CronSchedulerConfig::new(cron), job).await?;
    Ok(scheduler)
}
