//! Shipment tracking types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{impl_domain_status_conversions, CohortSyncError};

/// Which identifier a tracking record is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdentifierKind {
    None,
    OrderId,
    ParticipantTrackingId,
    ReturnTrackingId,
    FulfillmentId,
}

impl_domain_status_conversions!(IdentifierKind {
    None => "NONE",
    OrderId => "ORDER_ID",
    ParticipantTrackingId => "PARTICIPANT_TRACKING_ID",
    ReturnTrackingId => "RETURN_TRACKING_ID",
    FulfillmentId => "FULFILLMENT_ID",
});

/// Internal order lifecycle, listed in rank order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleStatus {
    Created,
    Fulfillment,
    Shipped,
    ParticipantShipped,
    ParticipantDelivery,
    BiobankShipped,
    BiobankDelivery,
    Completed,
    Cancelled,
}

impl_domain_status_conversions!(LifecycleStatus {
    Created => "CREATED",
    Fulfillment => "FULFILLMENT",
    Shipped => "SHIPPED",
    ParticipantShipped => "PARTICIPANT_SHIPPED",
    ParticipantDelivery => "PARTICIPANT_DELIVERY",
    BiobankShipped => "BIOBANK_SHIPPED",
    BiobankDelivery => "BIOBANK_DELIVERY",
    Completed => "COMPLETED",
    Cancelled => "CANCELLED",
});

/// Statuses reported by the shipping carrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CarrierStatus {
    PreTransit,
    InTransit,
    OutForDelivery,
    Delivered,
    Failure,
    Error,
}

impl_domain_status_conversions!(CarrierStatus {
    PreTransit => "PRE_TRANSIT",
    InTransit => "IN_TRANSIT",
    OutForDelivery => "OUT_FOR_DELIVERY",
    Delivered => "DELIVERED",
    Failure => "FAILURE",
    Error => "ERROR",
});

/// A status from either source enumeration.
///
/// Stored and transmitted as its bare string (`"DELIVERED"`, `"SHIPPED"`).
/// The two enumerations share no names, so parsing is unambiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TrackingStatus {
    Lifecycle(LifecycleStatus),
    Carrier(CarrierStatus),
}

impl TrackingStatus {
    /// Canonical string form.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Lifecycle(status) => status.as_str(),
            Self::Carrier(status) => status.as_str(),
        }
    }

    /// Error-class statuses bypass rank ordering.
    pub const fn is_error_class(&self) -> bool {
        matches!(self, Self::Carrier(CarrierStatus::Error | CarrierStatus::Failure))
    }
}

impl fmt::Display for TrackingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackingStatus {
    type Err = CohortSyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(status) = s.parse::<LifecycleStatus>() {
            return Ok(Self::Lifecycle(status));
        }
        if let Ok(status) = s.parse::<CarrierStatus>() {
            return Ok(Self::Carrier(status));
        }
        Err(CohortSyncError::InvalidInput(format!("unknown tracking status '{s}'")))
    }
}

impl TryFrom<String> for TrackingStatus {
    type Error = CohortSyncError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TrackingStatus> for String {
    fn from(status: TrackingStatus) -> Self {
        status.as_str().to_string()
    }
}

impl From<LifecycleStatus> for TrackingStatus {
    fn from(status: LifecycleStatus) -> Self {
        Self::Lifecycle(status)
    }
}

impl From<CarrierStatus> for TrackingStatus {
    fn from(status: CarrierStatus) -> Self {
        Self::Carrier(status)
    }
}

/// Last known status of one shipment identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingRecord {
    pub identifier: String,
    pub identifier_kind: IdentifierKind,
    pub order_id: Option<String>,
    pub participant_id: Option<String>,
    pub user_id: Option<String>,
    pub last_status: Option<TrackingStatus>,
    /// Highest rank accepted so far. Error-class statuses do not lower it.
    pub last_rank: Option<i32>,
    pub created_on: i64,
    pub updated_on: i64,
}

/// Inbound carrier/fulfillment status change.
///
/// `status` is kept raw so an unknown value fails the event loudly at
/// evaluation time instead of at deserialization on the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingEvent {
    pub identifier: String,
    pub identifier_kind: IdentifierKind,
    pub status: String,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub participant_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub carrier: Option<String>,
    #[serde(default)]
    pub occurred_at: Option<String>,
}

/// Outcome of the tracking guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// Status persisted; `previous` is `None` on first observation.
    Accept { previous: Option<TrackingStatus> },
    /// Stale or duplicate status; nothing was written.
    Reject { current: Option<TrackingStatus> },
}

impl GuardDecision {
    pub const fn is_accept(&self) -> bool {
        matches!(self, Self::Accept { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_enumerations() {
        assert_eq!(
            "DELIVERED".parse::<TrackingStatus>().unwrap(),
            TrackingStatus::Carrier(CarrierStatus::Delivered)
        );
        assert_eq!(
            "participant_delivery".parse::<TrackingStatus>().unwrap(),
            TrackingStatus::Lifecycle(LifecycleStatus::ParticipantDelivery)
        );
    }

    #[test]
    fn unknown_status_is_an_error() {
        let err = "LOST_IN_SPACE".parse::<TrackingStatus>().unwrap_err();
        assert!(matches!(err, CohortSyncError::InvalidInput(_)));
    }

    #[test]
    fn serde_uses_bare_strings() {
        let status = TrackingStatus::Carrier(CarrierStatus::InTransit);
        assert_eq!(serde_json::to_string(&status).unwrap(), "\"IN_TRANSIT\"");
        let back: TrackingStatus = serde_json::from_str("\"SHIPPED\"").unwrap();
        assert_eq!(back, TrackingStatus::Lifecycle(LifecycleStatus::Shipped));
        assert!(serde_json::from_str::<TrackingStatus>("\"NOPE\"").is_err());
    }

    #[test]
    fn only_error_and_failure_are_error_class() {
        assert!(TrackingStatus::Carrier(CarrierStatus::Error).is_error_class());
        assert!(TrackingStatus::Carrier(CarrierStatus::Failure).is_error_class());
        assert!(!TrackingStatus::Carrier(CarrierStatus::Delivered).is_error_class());
        assert!(!TrackingStatus::Lifecycle(LifecycleStatus::Cancelled).is_error_class());
    }

    #[test]
    fn tracking_event_accepts_minimal_json() {
        let event: TrackingEvent = serde_json::from_str(
            r#"{"identifier":"1Z999","identifier_kind":"PARTICIPANT_TRACKING_ID","status":"IN_TRANSIT"}"#,
        )
        .unwrap();
        assert_eq!(event.identifier_kind, IdentifierKind::ParticipantTrackingId);
        assert!(event.order_id.is_none());
    }
}
