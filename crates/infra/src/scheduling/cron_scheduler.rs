//! Cron-driven runner for background jobs.
//!
//! Each [`CronJobScheduler`] owns one job and one schedule. Ticks that fire
//! while the previous run is still in flight are skipped, every run is wrapped
//! in a timeout, and shutdown goes through an explicit cancellation token.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use cohortsync_domain::Result;
//! use cohortsync_infra::scheduling::{CronJobScheduler, CronSchedulerConfig, ScheduledJob};
//!
//! struct NoopJob;
//!
//! #[async_trait]
//! impl ScheduledJob for NoopJob {
//!     fn name(&self) -> &'static str {
//!         "noop"
//!     }
//!
//!     async fn run(&self) -> Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! # async fn example() -> cohortsync_infra::scheduling::SchedulerResult<()> {
//! let mut scheduler = CronJobScheduler::with_config(
//!     CronSchedulerConfig::new("0 */5 * * * *"),
//!     Arc::new(NoopJob),
//! )
//! .await?;
//!
//! scheduler.start().await?;
//! // ... application runs ...
//! scheduler.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cohortsync_domain::Result as DomainResult;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::observability::counters::{JobMetrics, JobMetricsSnapshot};
use crate::scheduling::error::{SchedulerError, SchedulerResult};

/// Unit of work triggered by a [`CronJobScheduler`].
#[async_trait]
pub trait ScheduledJob: Send + Sync {
    /// Stable name used in logs.
    fn name(&self) -> &'static str;

    /// Execute one run. Errors are logged and counted, never retried here.
    async fn run(&self) -> DomainResult<()>;
}

/// How a single trigger ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobRun {
    Completed,
    Failed,
    TimedOut,
    /// Previous run still in flight.
    Skipped,
}

/// Configuration for one scheduled job.
#[derive(Debug, Clone)]
pub struct CronSchedulerConfig {
    /// Six or seven field cron expression (seconds first).
    pub cron_expression: String,
    /// Timeout applied to a single job execution.
    pub job_timeout: Duration,
    /// Timeout for starting the underlying scheduler.
    pub start_timeout: Duration,
    /// Timeout for stopping the scheduler.
    pub stop_timeout: Duration,
    /// Timeout for awaiting the monitor task join handle.
    pub join_timeout: Duration,
}

impl CronSchedulerConfig {
    pub fn new(cron_expression: impl Into<String>) -> Self {
        Self { cron_expression: cron_expression.into(), ..Self::default() }
    }
}

impl Default for CronSchedulerConfig {
    fn default() -> Self {
        Self {
            cron_expression: "0 */15 * * * *".into(),
            job_timeout: Duration::from_secs(300),
            start_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(5),
            join_timeout: Duration::from_secs(5),
        }
    }
}

/// Cron scheduler with explicit lifecycle management.
pub struct CronJobScheduler {
    scheduler: Arc<RwLock<JobScheduler>>,
    config: CronSchedulerConfig,
    job_id: Uuid,
    monitor_handle: Option<JoinHandle<()>>,
    cancellation: CancellationToken,
    in_flight: Arc<AtomicBool>,
    metrics: Arc<JobMetrics>,
    job: Arc<dyn ScheduledJob>,
}

impl CronJobScheduler {
    /// Create a scheduler and register the job.
    ///
    /// An invalid cron expression fails here rather than at start.
    pub async fn with_config(
        config: CronSchedulerConfig,
        job: Arc<dyn ScheduledJob>,
    ) -> SchedulerResult<Self> {
        let raw_scheduler = JobScheduler::new()
            .await
            .map_err(|err| SchedulerError::CreationFailed(err.to_string()))?;

        let mut scheduler = Self {
            scheduler: Arc::new(RwLock::new(raw_scheduler)),
            config,
            job_id: Uuid::nil(),
            monitor_handle: None,
            cancellation: CancellationToken::new(),
            in_flight: Arc::new(AtomicBool::new(false)),
            metrics: Arc::new(JobMetrics::new()),
            job,
        };

        scheduler.job_id = scheduler.register_job().await?;
        Ok(scheduler)
    }

    /// Name of the scheduled job.
    pub fn job_name(&self) -> &'static str {
        self.job.name()
    }

    /// Start the scheduler, spawning the monitoring task.
    #[instrument(skip(self), fields(job = self.job.name()))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning { job: self.job.name() });
        }

        self.cancellation = CancellationToken::new();

        let scheduler = self.scheduler.clone();
        let start_timeout = self.config.start_timeout;
        let start_result = tokio::time::timeout(start_timeout, async move {
            let guard = scheduler.write().await;
            guard.start().await
        })
        .await
        .map_err(|_| SchedulerError::Timeout { phase: "start", seconds: start_timeout.as_secs() })?;

        start_result.map_err(|err| SchedulerError::StartFailed(err.to_string()))?;

        let cancel = self.cancellation.clone();
        let name = self.job.name();
        let handle = tokio::spawn(async move {
            cancel.cancelled().await;
            debug!(job = name, "scheduler monitor cancelled");
        });

        self.monitor_handle = Some(handle);
        info!(job = name, cron = %self.config.cron_expression, "scheduler started");
        Ok(())
    }

    /// Stop the scheduler and wait for the monitor task to finish.
    #[instrument(skip(self), fields(job = self.job.name()))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning { job: self.job.name() });
        }

        self.cancellation.cancel();

        let scheduler = self.scheduler.clone();
        let stop_timeout = self.config.stop_timeout;
        let stop_result = tokio::time::timeout(stop_timeout, async move {
            let mut guard = scheduler.write().await;
            guard.shutdown().await
        })
        .await
        .map_err(|_| SchedulerError::Timeout { phase: "stop", seconds: stop_timeout.as_secs() })?;

        stop_result.map_err(|err| SchedulerError::StopFailed(err.to_string()))?;

        if let Some(handle) = self.monitor_handle.take() {
            let join_timeout = self.config.join_timeout;
            tokio::time::timeout(join_timeout, handle)
                .await
                .map_err(|_| SchedulerError::Timeout { phase: "monitor join", seconds: join_timeout.as_secs() })??;
        }

        // A shut-down JobScheduler cannot be restarted; prepare a fresh one.
        let fresh = JobScheduler::new()
            .await
            .map_err(|err| SchedulerError::CreationFailed(err.to_string()))?;
        *self.scheduler.write().await = fresh;
        self.job_id = Uuid::nil();
        self.job_id = self.register_job().await?;

        info!(job = self.job.name(), "scheduler stopped");
        self.cancellation = CancellationToken::new();
        Ok(())
    }

    /// Returns true when the monitor task is active.
    pub fn is_running(&self) -> bool {
        self.monitor_handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Trigger the job immediately, outside the schedule.
    ///
    /// Shares the overlap guard with scheduled ticks.
    pub async fn run_now(&self) -> JobRun {
        execute_guarded(
            self.job.clone(),
            self.in_flight.clone(),
            self.metrics.clone(),
            self.config.job_timeout,
        )
        .await
    }

    pub fn metrics(&self) -> JobMetricsSnapshot {
        self.metrics.snapshot()
    }

    async fn register_job(&mut self) -> SchedulerResult<Uuid> {
        if self.job_id != Uuid::nil() {
            return Ok(self.job_id);
        }

        let cron_expr = self.config.cron_expression.clone();
        let job = self.job.clone();
        let in_flight = self.in_flight.clone();
        let metrics = self.metrics.clone();
        let job_timeout = self.config.job_timeout;

        let job_definition = Job::new_async(cron_expr.as_str(), move |_id, _lock| {
            let job = job.clone();
            let in_flight = in_flight.clone();
            let metrics = metrics.clone();

            Box::pin(async move {
                execute_guarded(job, in_flight, metrics, job_timeout).await;
            })
        })
        .map_err(|err| SchedulerError::JobRegistrationFailed {
            job: self.job.name().to_string(),
            reason: err.to_string(),
        })?;

        let job_id = job_definition.guid();
        let scheduler = self.scheduler.write().await;
        scheduler.add(job_definition).await.map_err(|err| {
            SchedulerError::JobRegistrationFailed {
                job: self.job.name().to_string(),
                reason: err.to_string(),
            }
        })?;

        debug!(job = self.job.name(), cron = %self.config.cron_expression, %job_id, "registered job");
        Ok(job_id)
    }
}

/// Clears the in-flight flag when a run ends, including on panic or timeout.
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

async fn execute_guarded(
    job: Arc<dyn ScheduledJob>,
    in_flight: Arc<AtomicBool>,
    metrics: Arc<JobMetrics>,
    job_timeout: Duration,
) -> JobRun {
    metrics.record_invoked();

    if in_flight.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
        metrics.record_skipped();
        debug!(job = job.name(), "previous run still in flight; skipping tick");
        return JobRun::Skipped;
    }
    let _guard = InFlightGuard(in_flight);

    let started = Instant::now();
    match tokio::time::timeout(job_timeout, job.run()).await {
        Ok(Ok(())) => {
            metrics.record_success(started.elapsed());
            debug!(job = job.name(), elapsed_ms = started.elapsed().as_millis(), "job finished");
            JobRun::Completed
        }
        Ok(Err(err)) => {
            metrics.record_failure(started.elapsed());
            error!(job = job.name(), error = %err, "job failed");
            JobRun::Failed
        }
        Err(_) => {
            metrics.record_timeout();
            warn!(job = job.name(), timeout_secs = job_timeout.as_secs(), "job timed out");
            JobRun::TimedOut
        }
    }
}

impl Drop for CronJobScheduler {
    fn drop(&mut self) {
        if self.is_running() {
            warn!(job = self.job.name(), "scheduler dropped while running; cancelling tasks");
            self.cancellation.cancel();
        }
    }
}
