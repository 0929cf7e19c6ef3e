//! Shipment tracking: rank table, guard and inbound event processing.

pub mod guard;
pub mod ordering;
pub mod ports;
pub mod processor;

pub use guard::TrackingEventGuard;
pub use ordering::{is_forward_or_unconditional, rank, rank_on};
pub use ports::RecordContext;
pub use processor::{TrackingEventProcessor, TrackingOutcome};
