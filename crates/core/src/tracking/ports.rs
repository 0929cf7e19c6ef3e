//! Port interfaces for order tracking

use async_trait::async_trait;
use cohortsync_domain::{IdentifierKind, Result, TrackingRecord, TrackingStatus};

/// Order and participant links carried by a tracking event.
///
/// Seeds a new record and fills in fields an existing record is still
/// missing; a link that is already set is never replaced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordContext {
    pub order_id: Option<String>,
    pub participant_id: Option<String>,
    pub user_id: Option<String>,
}

/// Conditional status write requested by the guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusAdvance {
    pub identifier: String,
    pub identifier_kind: IdentifierKind,
    pub status: TrackingStatus,
    pub rank: i32,
    /// Error-class status: write regardless of rank and keep `last_rank`.
    pub unconditional: bool,
    /// Applied only when the advance is accepted.
    pub context: RecordContext,
}

/// What the store did with a [`StatusAdvance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceResult {
    Advanced { previous: Option<TrackingStatus> },
    Unchanged { current: Option<TrackingStatus> },
}

/// Durable last-known status per shipment identifier.
#[async_trait]
pub trait OrderTrackingStore: Send + Sync {
    /// Look up the record for an identifier.
    async fn get(&self, identifier: &str, kind: IdentifierKind) -> Result<Option<TrackingRecord>>;

    /// Insert the record unless one exists for its key. Returns `true` if inserted.
    async fn insert_if_absent(&self, record: &TrackingRecord) -> Result<bool>;

    /// Compare-and-set the status in one atomic step.
    ///
    /// Advances when the stored rank is NULL or strictly lower than
    /// `advance.rank`, or when `advance.unconditional` is set. An accepted
    /// advance also fills NULL context columns from `advance.context`.
    async fn advance_status(&self, advance: &StatusAdvance) -> Result<AdvanceResult>;

    /// Whether any tracking record references the order.
    async fn exists_for_order(&self, order_id: &str) -> Result<bool>;
}
