//! Status ranking.
//!
//! Carrier statuses have no rank of their own. They are translated onto the
//! internal lifecycle first, and which lifecycle step they mean depends on
//! the leg the identifier tracks: a `DELIVERED` on a return label is the
//! biobank receiving the kit, not the participant.

use cohortsync_domain::{CarrierStatus, IdentifierKind, LifecycleStatus, TrackingStatus};

/// Rank reported for error-class statuses. Never compared.
pub const ERROR_CLASS_RANK: i32 = -1;

/// Which shipment leg an identifier tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShipmentLeg {
    /// Kit travelling to the participant.
    Outbound,
    /// Sample travelling back to the biobank.
    Return,
}

impl ShipmentLeg {
    pub const fn for_kind(kind: IdentifierKind) -> Self {
        match kind {
            IdentifierKind::ReturnTrackingId => Self::Return,
            IdentifierKind::None
            | IdentifierKind::OrderId
            | IdentifierKind::ParticipantTrackingId
            | IdentifierKind::FulfillmentId => Self::Outbound,
        }
    }
}

/// Canonical position of a lifecycle status.
pub const fn lifecycle_rank(status: LifecycleStatus) -> i32 {
    match status {
        LifecycleStatus::Created => 0,
        LifecycleStatus::Fulfillment => 1,
        LifecycleStatus::Shipped => 2,
        LifecycleStatus::ParticipantShipped => 3,
        LifecycleStatus::ParticipantDelivery => 4,
        LifecycleStatus::BiobankShipped => 5,
        LifecycleStatus::BiobankDelivery => 6,
        LifecycleStatus::Completed => 7,
        LifecycleStatus::Cancelled => 8,
    }
}

/// Translate a carrier status onto the lifecycle. `None` for error-class.
pub const fn translate_carrier(status: CarrierStatus, leg: ShipmentLeg) -> Option<LifecycleStatus> {
    match (status, leg) {
        (CarrierStatus::PreTransit, ShipmentLeg::Outbound) => Some(LifecycleStatus::Shipped),
        (CarrierStatus::InTransit | CarrierStatus::OutForDelivery, ShipmentLeg::Outbound) => {
            Some(LifecycleStatus::ParticipantShipped)
        }
        (CarrierStatus::Delivered, ShipmentLeg::Outbound) => {
            Some(LifecycleStatus::ParticipantDelivery)
        }
        (CarrierStatus::PreTransit, ShipmentLeg::Return) => {
            Some(LifecycleStatus::ParticipantDelivery)
        }
        (CarrierStatus::InTransit | CarrierStatus::OutForDelivery, ShipmentLeg::Return) => {
            Some(LifecycleStatus::BiobankShipped)
        }
        (CarrierStatus::Delivered, ShipmentLeg::Return) => Some(LifecycleStatus::BiobankDelivery),
        (CarrierStatus::Failure | CarrierStatus::Error, _) => None,
    }
}

/// Lifecycle step a status stands for on the given leg.
pub const fn to_lifecycle(status: TrackingStatus, leg: ShipmentLeg) -> Option<LifecycleStatus> {
    match status {
        TrackingStatus::Lifecycle(status) => Some(status),
        TrackingStatus::Carrier(status) => translate_carrier(status, leg),
    }
}

/// Rank of `status` as observed on an identifier of `kind`.
pub const fn rank_on(status: TrackingStatus, kind: IdentifierKind) -> i32 {
    match to_lifecycle(status, ShipmentLeg::for_kind(kind)) {
        Some(lifecycle) => lifecycle_rank(lifecycle),
        None => ERROR_CLASS_RANK,
    }
}

/// Rank of `status` on the outbound leg.
pub const fn rank(status: TrackingStatus) -> i32 {
    rank_on(status, IdentifierKind::ParticipantTrackingId)
}

/// True when `new_status` may replace a status of `current_rank`.
///
/// Error-class statuses always pass. Everything else must be strictly
/// higher; an equal rank is a duplicate.
pub const fn is_forward_or_unconditional(new_status: TrackingStatus, current_rank: i32) -> bool {
    new_status.is_error_class() || rank(new_status) > current_rank
}

/// [`is_forward_or_unconditional`] with leg-aware translation.
pub const fn is_forward_or_unconditional_on(
    new_status: TrackingStatus,
    kind: IdentifierKind,
    current_rank: i32,
) -> bool {
    new_status.is_error_class() || rank_on(new_status, kind) > current_rank
}
