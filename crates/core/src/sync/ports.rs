//! Port interfaces for partner sync

use async_trait::async_trait;
use cohortsync_domain::{ChangeType, PendingChange, Result, SyncRetryEntry, SyncedSnapshot};

/// Durable queue of failed or deferred partner writes.
#[async_trait]
pub trait SyncRetryRepository: Send + Sync {
    /// Create the entry with `retry_count = 0`, or bump an existing one.
    ///
    /// Refreshing also replaces `payload`, `error_details` and `updated_on`.
    async fn upsert_failure(
        &self,
        subject_id: &str,
        change_type: ChangeType,
        payload: &str,
        error_details: Option<&str>,
    ) -> Result<SyncRetryEntry>;

    /// Remove the entry for the key. Returns `true` if one existed.
    async fn delete(&self, subject_id: &str, change_type: ChangeType) -> Result<bool>;

    /// Fetch the entry for the key regardless of retry count.
    async fn get(&self, subject_id: &str, change_type: ChangeType)
        -> Result<Option<SyncRetryEntry>>;

    /// Entries with `retry_count < max_retry`, oldest `updated_on` first.
    async fn list_eligible(&self, max_retry: i32, limit: usize) -> Result<Vec<SyncRetryEntry>>;

    /// Entries that reached `max_retry` and are no longer swept.
    async fn list_exhausted(&self, max_retry: i32) -> Result<Vec<SyncRetryEntry>>;
}

/// Last confirmed partner payload per key.
#[async_trait]
pub trait SyncedSnapshotRepository: Send + Sync {
    async fn get(&self, subject_id: &str, change_type: ChangeType)
        -> Result<Option<SyncedSnapshot>>;

    /// Overwrite the snapshot for the key.
    async fn upsert(
        &self,
        subject_id: &str,
        change_type: ChangeType,
        payload: &serde_json::Value,
    ) -> Result<()>;
}

/// Partner write API.
#[async_trait]
pub trait PartnerWriter: Send + Sync {
    /// Send the change. Any error means the partner did not accept it.
    async fn write(&self, change: &PendingChange) -> Result<()>;
}

/// Lookup between internal subjects and partner participant ids.
#[async_trait]
pub trait ParticipantDirectory: Send + Sync {
    async fn partner_id_for_subject(&self, subject_id: &str) -> Result<Option<String>>;

    async fn subject_for_partner_id(&self, partner_participant_id: &str)
        -> Result<Option<String>>;

    async fn link(&self, subject_id: &str, partner_participant_id: &str) -> Result<()>;
}
