//! Scripted partner clients and a recording bus.

use std::collections::VecDeque;

use async_trait::async_trait;
use cohortsync_core::{EventPublisher, PartnerWriter, StatusFeedClient};
use cohortsync_domain::{CohortSyncError, OutboundEvent, PendingChange, Result as DomainResult};
use parking_lot::Mutex;

/// Partner writer that answers from a script, then succeeds.
#[derive(Default)]
pub struct MockPartnerWriter {
    script: Mutex<VecDeque<DomainResult<()>>>,
    calls: Mutex<Vec<PendingChange>>,
}

impl MockPartnerWriter {
    pub fn fail_next(&self, times: usize, message: &str) {
        let mut script = self.script.lock();
        for _ in 0..times {
            script.push_back(Err(CohortSyncError::Network(message.to_string())));
        }
    }

    pub fn calls(&self) -> Vec<PendingChange> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl PartnerWriter for MockPartnerWriter {
    async fn write(&self, change: &PendingChange) -> DomainResult<()> {
        self.calls.lock().push(change.clone());
        self.script.lock().pop_front().unwrap_or(Ok(()))
    }
}

/// Status feed that replays scripted bodies and records cursors.
#[derive(Default)]
pub struct MockFeedClient {
    responses: Mutex<VecDeque<DomainResult<String>>>,
    cursors: Mutex<Vec<String>>,
}

impl MockFeedClient {
    pub fn respond_with(&self, body: impl Into<String>) {
        self.responses.lock().push_back(Ok(body.into()));
    }

    pub fn fail_with(&self, error: CohortSyncError) {
        self.responses.lock().push_back(Err(error));
    }

    pub fn cursors(&self) -> Vec<String> {
        self.cursors.lock().clone()
    }
}

#[async_trait]
impl StatusFeedClient for MockFeedClient {
    async fn fetch_status_feed(&self, cursor: &str) -> DomainResult<String> {
        self.cursors.lock().push(cursor.to_string());
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(CohortSyncError::Network("no scripted response".into())))
    }
}

/// Bus that keeps every published event; can be told to fail.
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<OutboundEvent>>,
    fail_after: Mutex<Option<usize>>,
}

impl RecordingPublisher {
    /// Accept `n` more events, then fail every publish.
    pub fn fail_after(&self, n: usize) {
        *self.fail_after.lock() = Some(self.events.lock().len() + n);
    }

    pub fn recover(&self) {
        *self.fail_after.lock() = None;
    }

    pub fn events(&self) -> Vec<OutboundEvent> {
        self.events.lock().clone()
    }

    pub fn on_topic(&self, topic: &str) -> Vec<OutboundEvent> {
        self.events.lock().iter().filter(|e| e.topic == topic).cloned().collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: OutboundEvent) -> DomainResult<()> {
        let mut events = self.events.lock();
        if let Some(limit) = *self.fail_after.lock() {
            if events.len() >= limit {
                return Err(CohortSyncError::Network("bus unavailable".into()));
            }
        }
        events.push(event);
        Ok(())
    }
}
