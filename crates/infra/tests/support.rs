//! Shared helpers for `cohortsync-infra` integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use cohortsync_core::{
    AccountChangeProcessor, ChangeDetector, GenomicsBatchPublisher, GenomicsFetchService,
    SyncRetryQueue, SyncRetrySweeper, SyncService, TrackingEventGuard, TrackingEventProcessor,
};
use cohortsync_domain::PartnerConfig;
use cohortsync_infra::database::{
    DbManager, SqliteGenomicsRepository, SqliteOrderTrackingStore, SqliteParticipantDirectory,
    SqliteSyncRetryRepository, SqliteSyncedSnapshotRepository,
};
use cohortsync_infra::events::InProcessEventBus;
use cohortsync_infra::integrations::PartnerClient;
use cohortsync_infra::observability::SyncMetrics;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

pub const MAX_RETRY: i32 = 3;

/// Route tracing output through the test harness. Set `RUST_LOG` to see it.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_test_writer()
        .try_init();
}

/// Temporary database that lives as long as the wrapper.
pub struct TestDatabase {
    pub manager: Arc<DbManager>,
    _temp_dir: TempDir,
}

impl TestDatabase {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let db_path = temp_dir.path().join("cohortsync-test.db");

        let manager = DbManager::new(&db_path, 4).expect("db manager should be created");
        manager.run_migrations().expect("schema migrations should apply");

        Self { manager: Arc::new(manager), _temp_dir: temp_dir }
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

/// Every component wired over SQLite and a partner at `base_url`.
pub struct Stack {
    pub db: TestDatabase,
    pub genomics: Arc<SqliteGenomicsRepository>,
    pub tracking: Arc<SqliteOrderTrackingStore>,
    pub retries: Arc<SqliteSyncRetryRepository>,
    pub snapshots: Arc<SqliteSyncedSnapshotRepository>,
    pub directory: Arc<SqliteParticipantDirectory>,
    pub bus: Arc<InProcessEventBus>,
    pub metrics: Arc<SyncMetrics>,
    pub fetch: GenomicsFetchService,
    pub publisher: GenomicsBatchPublisher,
    pub processor: TrackingEventProcessor,
    pub accounts: AccountChangeProcessor,
    pub sweeper: SyncRetrySweeper,
}

impl Stack {
    pub fn new(base_url: &str) -> Self {
        init_tracing();
        let db = TestDatabase::new();
        let genomics = Arc::new(SqliteGenomicsRepository::new(db.manager.clone()));
        let tracking = Arc::new(SqliteOrderTrackingStore::new(db.manager.clone()));
        let retries = Arc::new(SqliteSyncRetryRepository::new(db.manager.clone()));
        let snapshots = Arc::new(SqliteSyncedSnapshotRepository::new(db.manager.clone()));
        let directory = Arc::new(SqliteParticipantDirectory::new(db.manager.clone()));
        let bus = Arc::new(InProcessEventBus::new(64));
        let metrics = Arc::new(SyncMetrics::new());

        let partner = Arc::new(
            PartnerClient::new(&partner_config(base_url)).expect("partner client should build"),
        );

        let queue = Arc::new(SyncRetryQueue::new(
            retries.clone(),
            snapshots.clone(),
            ChangeDetector::new(["updated_at"]),
            metrics.clone(),
        ));
        let sync = Arc::new(SyncService::new(
            queue,
            partner.clone(),
            directory.clone(),
            bus.clone(),
            metrics.clone(),
        ));

        let fetch =
            GenomicsFetchService::new(partner, genomics.clone(), metrics.clone(), 2);
        let publisher = GenomicsBatchPublisher::new(
            genomics.clone(),
            directory.clone(),
            bus.clone(),
            metrics.clone(),
        );
        let processor = TrackingEventProcessor::new(
            TrackingEventGuard::new(tracking.clone(), metrics.clone()),
            tracking.clone(),
            sync.clone(),
        );
        let accounts = AccountChangeProcessor::new(sync.clone());
        let sweeper =
            SyncRetrySweeper::new(retries.clone(), sync, metrics.clone(), MAX_RETRY, 100);

        Self {
            db,
            genomics,
            tracking,
            retries,
            snapshots,
            directory,
            bus,
            metrics,
            fetch,
            publisher,
            processor,
            accounts,
            sweeper,
        }
    }
}

pub fn partner_config(base_url: &str) -> PartnerConfig {
    PartnerConfig {
        base_url: base_url.to_string(),
        feed_path: "genomics/status".into(),
        timeout_secs: 5,
        max_attempts: 1,
        api_token: None,
    }
}
