//! Internal event bus port.

use async_trait::async_trait;
use cohortsync_domain::{OutboundEvent, Result};

/// Producer side of the internal event bus.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish one event. Ordering is only guaranteed per `event.key`.
    async fn publish(&self, event: OutboundEvent) -> Result<()>;
}
