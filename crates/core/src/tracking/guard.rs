//! Monotonic accept/reject of inbound tracking statuses.

use std::sync::Arc;

use chrono::Utc;
use cohortsync_domain::{
    CohortSyncError, GuardDecision, IdentifierKind, Result, TrackingRecord, TrackingStatus,
};
use tracing::{debug, instrument};

use super::ordering::{rank_on, ERROR_CLASS_RANK};
use super::ports::{AdvanceResult, OrderTrackingStore, RecordContext, StatusAdvance};
use crate::metrics::{MetricsSink, SyncMetric};

/// Decides whether a status may replace the stored one.
pub struct TrackingEventGuard {
    store: Arc<dyn OrderTrackingStore>,
    metrics: Arc<dyn MetricsSink>,
}

impl TrackingEventGuard {
    pub fn new(store: Arc<dyn OrderTrackingStore>, metrics: Arc<dyn MetricsSink>) -> Self {
        Self { store, metrics }
    }

    /// Evaluate a status for an identifier with no extra record context.
    pub async fn evaluate(
        &self,
        identifier: &str,
        identifier_kind: IdentifierKind,
        incoming: TrackingStatus,
    ) -> Result<GuardDecision> {
        self.evaluate_with(identifier, identifier_kind, incoming, RecordContext::default()).await
    }

    /// Evaluate a status, seeding the record with `context` if it is new and
    /// backfilling missing links if the status is accepted.
    ///
    /// Rejection is a normal outcome and returns `Ok`. Errors are reserved
    /// for invalid input and store failures.
    #[instrument(skip(self, context), fields(status = %incoming))]
    pub async fn evaluate_with(
        &self,
        identifier: &str,
        identifier_kind: IdentifierKind,
        incoming: TrackingStatus,
        context: RecordContext,
    ) -> Result<GuardDecision> {
        if identifier.trim().is_empty() {
            return Err(CohortSyncError::InvalidInput("tracking identifier is empty".into()));
        }
        if identifier_kind == IdentifierKind::None {
            return Err(CohortSyncError::InvalidInput(format!(
                "identifier kind missing for '{identifier}'"
            )));
        }

        let unconditional = incoming.is_error_class();
        let rank = rank_on(incoming, identifier_kind);
        let now = Utc::now().timestamp_millis();

        let seed = TrackingRecord {
            identifier: identifier.to_string(),
            identifier_kind,
            order_id: context.order_id.clone(),
            participant_id: context.participant_id.clone(),
            user_id: context.user_id.clone(),
            last_status: Some(incoming),
            last_rank: (!unconditional).then_some(rank),
            created_on: now,
            updated_on: now,
        };

        if self.store.insert_if_absent(&seed).await? {
            debug!(%identifier, kind = %identifier_kind, "first observation accepted");
            self.metrics.incr(SyncMetric::TrackingAccepted);
            return Ok(GuardDecision::Accept { previous: None });
        }

        let advance = StatusAdvance {
            identifier: identifier.to_string(),
            identifier_kind,
            status: incoming,
            rank: if unconditional { ERROR_CLASS_RANK } else { rank },
            unconditional,
            context,
        };

        match self.store.advance_status(&advance).await? {
            AdvanceResult::Advanced { previous } => {
                debug!(%identifier, previous = ?previous, "status advanced");
                self.metrics.incr(SyncMetric::TrackingAccepted);
                Ok(GuardDecision::Accept { previous })
            }
            AdvanceResult::Unchanged { current } => {
                debug!(%identifier, current = ?current, "stale or duplicate status rejected");
                self.metrics.incr(SyncMetric::TrackingRejected);
                Ok(GuardDecision::Reject { current })
            }
        }
    }
}
