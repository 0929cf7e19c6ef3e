//! Broadcast-backed event bus.

use async_trait::async_trait;
use cohortsync_core::EventPublisher;
use cohortsync_domain::{CohortSyncError, OutboundEvent, Result};
use tokio::sync::broadcast;
use tracing::trace;

/// In-process implementation of [`EventPublisher`].
///
/// Every subscriber sees every event in publish order. Publishing with no
/// live subscriber is an error, so callers treat the event as undelivered.
#[derive(Debug, Clone)]
pub struct InProcessEventBus {
    sender: broadcast::Sender<OutboundEvent>,
}

impl InProcessEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OutboundEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl EventPublisher for InProcessEventBus {
    async fn publish(&self, event: OutboundEvent) -> Result<()> {
        trace!(topic = %event.topic, key = %event.key, "publishing event");
        self.sender.send(event).map(|_| ()).map_err(|err| {
            CohortSyncError::Network(format!(
                "no subscriber for topic {} (key {})",
                err.0.topic, err.0.key
            ))
        })
    }
}
