//! Partitioned dispatch of inbound events.
//!
//! Events are routed by `hash(partition_key) % partitions`, so all events for
//! one tracking identifier or subject are handled in arrival order by a single
//! worker. Different keys proceed in parallel.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cohortsync_core::{AccountChangeProcessor, TrackingEventProcessor};
use cohortsync_domain::{CohortSyncError, DispatchConfig, InboundEvent, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Consumer of a single inbound event.
#[async_trait]
pub trait InboundHandler: Send + Sync {
    async fn handle(&self, event: InboundEvent) -> Result<()>;
}

/// Routes events to the tracking and account processors.
pub struct SyncInboundHandler {
    tracking: Arc<TrackingEventProcessor>,
    accounts: Arc<AccountChangeProcessor>,
}

impl SyncInboundHandler {
    pub fn new(tracking: Arc<TrackingEventProcessor>, accounts: Arc<AccountChangeProcessor>) -> Self {
        Self { tracking, accounts }
    }
}

#[async_trait]
impl InboundHandler for SyncInboundHandler {
    async fn handle(&self, event: InboundEvent) -> Result<()> {
        match event {
            InboundEvent::Tracking(event) => {
                let outcome = self.tracking.handle(&event).await?;
                debug!(identifier = %event.identifier, ?outcome, "tracking event handled");
            }
            InboundEvent::AccountUpdate(event) => {
                let outcome = self.accounts.handle(&event).await?;
                debug!(subject_id = %event.subject_id, ?outcome, "account update handled");
            }
        }
        Ok(())
    }
}

/// Counters shared by all partition workers.
#[derive(Debug, Default)]
pub struct DispatcherStats {
    handled: AtomicU64,
    failed: AtomicU64,
}

impl DispatcherStats {
    pub fn handled(&self) -> u64 {
        self.handled.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Fixed pool of partition workers fed by bounded channels.
pub struct InboundDispatcher {
    senders: Vec<mpsc::Sender<InboundEvent>>,
    workers: Vec<JoinHandle<()>>,
    cancellation: CancellationToken,
    stats: Arc<DispatcherStats>,
}

impl InboundDispatcher {
    /// Spawn one worker per partition.
    pub fn start(config: &DispatchConfig, handler: Arc<dyn InboundHandler>) -> Self {
        let partitions = config.partitions.max(1);
        let capacity = config.channel_capacity.max(1);
        let cancellation = CancellationToken::new();
        let stats = Arc::new(DispatcherStats::default());

        let mut senders = Vec::with_capacity(partitions);
        let mut workers = Vec::with_capacity(partitions);
        for partition in 0..partitions {
            let (tx, rx) = mpsc::channel(capacity);
            senders.push(tx);
            workers.push(tokio::spawn(run_worker(
                partition,
                rx,
                handler.clone(),
                cancellation.clone(),
                stats.clone(),
            )));
        }

        info!(partitions, capacity, "inbound dispatcher started");
        Self { senders, workers, cancellation, stats }
    }

    pub fn partitions(&self) -> usize {
        self.senders.len()
    }

    /// Partition an event key maps to.
    pub fn partition_for(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let bucket = hasher.finish() % self.senders.len() as u64;
        usize::try_from(bucket).unwrap_or_default()
    }

    /// Queue an event on its partition. Waits while the partition is full.
    pub async fn dispatch(&self, event: InboundEvent) -> Result<()> {
        let partition = self.partition_for(event.partition_key());
        self.senders[partition].send(event).await.map_err(|err| {
            CohortSyncError::Internal(format!(
                "partition {partition} closed; dropped event for {}",
                err.0.partition_key()
            ))
        })
    }

    pub fn stats(&self) -> Arc<DispatcherStats> {
        self.stats.clone()
    }

    /// Stop accepting events, drain what is queued, then join the workers.
    ///
    /// Workers still running after `timeout` are cancelled.
    pub async fn shutdown(self, timeout: Duration) {
        let Self { senders, workers, cancellation, .. } = self;
        drop(senders);

        let joined = tokio::time::timeout(timeout, futures::future::join_all(workers)).await;
        match joined {
            Ok(results) => {
                for result in results {
                    if let Err(err) = result {
                        error!(error = %err, "dispatcher worker panicked");
                    }
                }
                info!("inbound dispatcher drained");
            }
            Err(_) => {
                warn!(timeout_secs = timeout.as_secs(), "dispatcher drain timed out; cancelling workers");
                cancellation.cancel();
            }
        }
    }
}

async fn run_worker(
    partition: usize,
    mut rx: mpsc::Receiver<InboundEvent>,
    handler: Arc<dyn InboundHandler>,
    cancellation: CancellationToken,
    stats: Arc<DispatcherStats>,
) {
    loop {
        let event = tokio::select! {
            () = cancellation.cancelled() => break,
            next = rx.recv() => match next {
                Some(event) => event,
                None => break,
            },
        };

        let key = event.partition_key().to_string();
        match handler.handle(event).await {
            Ok(()) => {
                stats.handled.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                error!(partition, key = %key, error = %err, "inbound event failed");
            }
        }
    }
    debug!(partition, "dispatcher worker stopped");
}
