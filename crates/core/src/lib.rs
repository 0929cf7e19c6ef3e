//! # CohortSync Core
//!
//! Pure synchronization logic - no infrastructure dependencies.
//!
//! This crate contains:
//! - The tracking status guard and its rank table
//! - The genomics fetch and batch publish pipeline
//! - The change-detection gate, retry queue and sweeper
//! - Port interfaces (traits) for every store, client and bus it touches
//!
//! ## Architecture Principles
//! - Only depends on `cohortsync-domain`
//! - No database, HTTP, or scheduler code
//! - All external dependencies via traits
//! - Metrics flow through an injected [`MetricsSink`]

pub mod events;
pub mod genomics;
pub mod metrics;
pub mod sync;
pub mod tracking;

pub use events::EventPublisher;
pub use genomics::ports::{GenomicsBatchStore, GenomicsPayloadRepository, StatusFeedClient};
pub use genomics::{
    FetchOutcome, FetchReport, GenomicsBatchPublisher, GenomicsFetchService, PublishReport,
};
pub use metrics::{MetricsSink, NoopMetrics, SyncMetric};
pub use sync::ports::{
    ParticipantDirectory, PartnerWriter, SyncRetryRepository, SyncedSnapshotRepository,
};
pub use sync::{
    AccountChangeProcessor, ChangeDetector, SubmitResult, SweepReport, SyncRetryQueue,
    SyncRetrySweeper, SyncService,
};
pub use tracking::ports::{AdvanceResult, OrderTrackingStore, RecordContext, StatusAdvance};
pub use tracking::{TrackingEventGuard, TrackingEventProcessor, TrackingOutcome};
