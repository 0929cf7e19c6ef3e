//! Inbound tracking event handling.

use std::sync::Arc;

use cohortsync_domain::{
    ChangeType, GuardDecision, PendingChange, Result, TrackingEvent, TrackingStatus, WriteMethod,
};
use serde_json::json;
use tracing::{debug, info, instrument};

use super::guard::TrackingEventGuard;
use super::ordering::{to_lifecycle, ShipmentLeg};
use super::ports::{OrderTrackingStore, RecordContext};
use crate::sync::{SubmitResult, SyncService};

/// What happened to one inbound tracking event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackingOutcome {
    /// Stale or duplicate; dropped.
    Rejected,
    /// Persisted. `forwarded` is `None` when the event carried no order.
    Accepted { forwarded: Option<SubmitResult> },
}

/// Runs tracking events through the guard and forwards accepted ones.
pub struct TrackingEventProcessor {
    guard: TrackingEventGuard,
    store: Arc<dyn OrderTrackingStore>,
    sync: Arc<SyncService>,
}

impl TrackingEventProcessor {
    pub fn new(
        guard: TrackingEventGuard,
        store: Arc<dyn OrderTrackingStore>,
        sync: Arc<SyncService>,
    ) -> Self {
        Self { guard, store, sync }
    }

    /// Handle one event.
    ///
    /// An unknown status string fails the event with `InvalidInput`.
    #[instrument(skip(self, event), fields(identifier = %event.identifier, kind = %event.identifier_kind))]
    pub async fn handle(&self, event: &TrackingEvent) -> Result<TrackingOutcome> {
        let status: TrackingStatus = event.status.parse()?;

        // Must be read before the guard creates this identifier's record.
        let method = match &event.order_id {
            Some(order_id) if self.store.exists_for_order(order_id).await? => WriteMethod::Put,
            Some(_) => WriteMethod::Post,
            None => WriteMethod::Put,
        };

        let context = RecordContext {
            order_id: event.order_id.clone(),
            participant_id: event.participant_id.clone(),
            user_id: event.user_id.clone(),
        };

        let decision = self
            .guard
            .evaluate_with(&event.identifier, event.identifier_kind, status, context)
            .await?;

        if let GuardDecision::Reject { current } = decision {
            info!(
                incoming = %status,
                current = current.map(|s| s.to_string()).as_deref().unwrap_or("-"),
                "dropping out-of-order tracking event"
            );
            return Ok(TrackingOutcome::Rejected);
        }

        let Some(order_id) = &event.order_id else {
            debug!("accepted tracking event has no order; nothing to forward");
            return Ok(TrackingOutcome::Accepted { forwarded: None });
        };

        let change = PendingChange {
            subject_id: order_id.clone(),
            change_type: ChangeType::OrderTracking,
            method,
            target_id: order_id.clone(),
            body: tracking_body(event, status),
        };

        let result = self.sync.submit(&change).await?;
        Ok(TrackingOutcome::Accepted { forwarded: Some(result) })
    }
}

fn tracking_body(event: &TrackingEvent, status: TrackingStatus) -> serde_json::Value {
    let lifecycle = to_lifecycle(status, ShipmentLeg::for_kind(event.identifier_kind));
    json!({
        "identifier": event.identifier,
        "identifier_kind": event.identifier_kind,
        "status": status,
        "lifecycle_status": lifecycle,
        "carrier": event.carrier,
        "participant_id": event.participant_id,
        "occurred_at": event.occurred_at,
    })
}
