//! Partner status feed puller.

use std::sync::Arc;

use chrono::Utc;
use cohortsync_domain::constants::DEFAULT_FEED_CURSOR;
use cohortsync_domain::{FeedResponse, GenomicsPayload, ProcessingStatus, Result};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::batching::slice_records;
use super::ports::{GenomicsPayloadRepository, StatusFeedClient};
use crate::metrics::{MetricsSink, SyncMetric};

/// How a fetch tick ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Payload and batches stored; cursor advanced.
    Persisted { payload_id: String },
    /// Partner unreachable or returned an error status; cursor unchanged.
    TransportFailed { reason: String },
    /// Body did not parse; nothing stored, cursor unchanged.
    Malformed { reason: String },
}

/// Summary of one fetch tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchReport {
    pub cursor: String,
    pub next_cursor: Option<String>,
    pub records: usize,
    pub batches: usize,
    pub outcome: FetchOutcome,
}

impl FetchReport {
    fn skipped(cursor: String, outcome: FetchOutcome) -> Self {
        Self { cursor, next_cursor: None, records: 0, batches: 0, outcome }
    }
}

/// Pulls the feed once per tick and slices it into batches.
pub struct GenomicsFetchService {
    feed: Arc<dyn StatusFeedClient>,
    payloads: Arc<dyn GenomicsPayloadRepository>,
    metrics: Arc<dyn MetricsSink>,
    batch_size: usize,
}

impl GenomicsFetchService {
    pub fn new(
        feed: Arc<dyn StatusFeedClient>,
        payloads: Arc<dyn GenomicsPayloadRepository>,
        metrics: Arc<dyn MetricsSink>,
        batch_size: usize,
    ) -> Self {
        Self { feed, payloads, metrics, batch_size }
    }

    /// Cursor the next fetch will send.
    pub async fn current_cursor(&self) -> Result<String> {
        Ok(self
            .payloads
            .latest_cursor()
            .await?
            .unwrap_or_else(|| DEFAULT_FEED_CURSOR.to_string()))
    }

    /// Fetch, persist and slice one page of the feed.
    ///
    /// Transport and parse failures are reported in the returned
    /// [`FetchReport`]; `Err` means the store itself failed.
    #[instrument(skip(self), fields(batch_size = self.batch_size))]
    pub async fn run_once(&self) -> Result<FetchReport> {
        let cursor = self.current_cursor().await?;

        let body = match self.feed.fetch_status_feed(&cursor).await {
            Ok(body) => body,
            Err(err) => {
                self.metrics.incr(SyncMetric::FeedFetchFailed);
                warn!(%cursor, error = %err, "status feed unreachable; cursor not advanced");
                return Ok(FetchReport::skipped(
                    cursor,
                    FetchOutcome::TransportFailed { reason: err.to_string() },
                ));
            }
        };

        let response: FeedResponse = match serde_json::from_str(&body) {
            Ok(response) => response,
            Err(err) => {
                self.metrics.incr(SyncMetric::FeedFetchFailed);
                error!(%cursor, error = %err, body_len = body.len(), "malformed status feed response");
                return Ok(FetchReport::skipped(
                    cursor,
                    FetchOutcome::Malformed { reason: err.to_string() },
                ));
            }
        };

        let now = Utc::now().timestamp_millis();
        let payload = GenomicsPayload {
            id: Uuid::now_v7().to_string(),
            raw_payload: body,
            requested_timestamp: cursor.clone(),
            next_timestamp: response.timestamp.clone(),
            record_count: response.data.len() as i64,
            status: ProcessingStatus::Complete,
            created_on: now,
        };
        let batches = slice_records(&payload.id, &response.data, self.batch_size, now)?;

        self.payloads.save_payload_with_batches(&payload, &batches).await?;

        self.metrics.incr(SyncMetric::FeedFetchSucceeded);
        self.metrics.increment(SyncMetric::BatchesCreated, batches.len() as u64);
        info!(
            %cursor,
            next_cursor = %response.timestamp,
            records = response.data.len(),
            batches = batches.len(),
            "status feed page stored"
        );

        Ok(FetchReport {
            cursor,
            next_cursor: Some(response.timestamp),
            records: response.data.len(),
            batches: batches.len(),
            outcome: FetchOutcome::Persisted { payload_id: payload.id },
        })
    }
}
