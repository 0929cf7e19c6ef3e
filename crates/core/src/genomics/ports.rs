//! Port interfaces for the genomics pipeline

use async_trait::async_trait;
use cohortsync_domain::{BatchStats, GenomicsBatch, GenomicsPayload, ProcessingStatus, Result};

/// Partner status feed.
#[async_trait]
pub trait StatusFeedClient: Send + Sync {
    /// Fetch the raw feed body starting at `cursor`.
    ///
    /// Errors are transport failures. Parsing is the caller's job so a
    /// malformed body can be told apart from an unreachable partner.
    async fn fetch_status_feed(&self, cursor: &str) -> Result<String>;
}

/// Storage for fetched payloads.
#[async_trait]
pub trait GenomicsPayloadRepository: Send + Sync {
    /// `next_timestamp` of the most recently stored payload.
    async fn latest_cursor(&self) -> Result<Option<String>>;

    /// Store a payload and its batches in one transaction.
    async fn save_payload_with_batches(
        &self,
        payload: &GenomicsPayload,
        batches: &[GenomicsBatch],
    ) -> Result<()>;

    async fn get_payload(&self, payload_id: &str) -> Result<GenomicsPayload>;
}

/// Durable per-batch processing state.
#[async_trait]
pub trait GenomicsBatchStore: Send + Sync {
    async fn get_batch(&self, batch_id: &str) -> Result<GenomicsBatch>;

    /// Batches in any of `statuses`, oldest `created_on` first.
    async fn list_by_statuses(
        &self,
        statuses: &[ProcessingStatus],
        limit: Option<usize>,
    ) -> Result<Vec<GenomicsBatch>>;

    async fn batches_for_payload(&self, payload_id: &str) -> Result<Vec<GenomicsBatch>>;

    /// Set the status and error details; `retry_count` is left alone.
    async fn update_status(
        &self,
        batch_id: &str,
        status: ProcessingStatus,
        error_details: Option<&str>,
    ) -> Result<()>;

    async fn stats(&self) -> Result<BatchStats>;
}
