//! In-memory repository mocks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use cohortsync_core::{
    AdvanceResult, GenomicsBatchStore, GenomicsPayloadRepository, OrderTrackingStore,
    ParticipantDirectory, StatusAdvance, SyncRetryRepository, SyncedSnapshotRepository,
};
use cohortsync_domain::{
    BatchStats, ChangeType, CohortSyncError, GenomicsBatch, GenomicsPayload, IdentifierKind,
    ProcessingStatus, Result as DomainResult, SyncRetryEntry, SyncedSnapshot, TrackingRecord,
};
use parking_lot::Mutex;

/// Monotonic fake clock so ordering by timestamp is deterministic.
#[derive(Default)]
struct Ticker(AtomicI64);

impl Ticker {
    fn next(&self) -> i64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

// ============================================================================
// Tracking
// ============================================================================

/// In-memory `OrderTrackingStore` with the same compare-and-set rule as SQL.
#[derive(Default)]
pub struct InMemoryTrackingStore {
    records: Mutex<HashMap<(String, IdentifierKind), TrackingRecord>>,
}

impl InMemoryTrackingStore {
    pub fn record(&self, identifier: &str, kind: IdentifierKind) -> Option<TrackingRecord> {
        self.records.lock().get(&(identifier.to_string(), kind)).cloned()
    }
}

#[async_trait]
impl OrderTrackingStore for InMemoryTrackingStore {
    async fn get(
        &self,
        identifier: &str,
        kind: IdentifierKind,
    ) -> DomainResult<Option<TrackingRecord>> {
        Ok(self.record(identifier, kind))
    }

    async fn insert_if_absent(&self, record: &TrackingRecord) -> DomainResult<bool> {
        let mut records = self.records.lock();
        let key = (record.identifier.clone(), record.identifier_kind);
        if records.contains_key(&key) {
            return Ok(false);
        }
        records.insert(key, record.clone());
        Ok(true)
    }

    async fn advance_status(&self, advance: &StatusAdvance) -> DomainResult<AdvanceResult> {
        let mut records = self.records.lock();
        let record = records
            .get_mut(&(advance.identifier.clone(), advance.identifier_kind))
            .ok_or_else(|| CohortSyncError::NotFound(advance.identifier.clone()))?;

        let forward = advance.unconditional || record.last_rank.map_or(true, |r| r < advance.rank);
        if !forward {
            return Ok(AdvanceResult::Unchanged { current: record.last_status });
        }

        let previous = record.last_status;
        record.last_status = Some(advance.status);
        if !advance.unconditional {
            record.last_rank = Some(advance.rank);
        }
        let context = &advance.context;
        if record.order_id.is_none() {
            record.order_id = context.order_id.clone();
        }
        if record.participant_id.is_none() {
            record.participant_id = context.participant_id.clone();
        }
        if record.user_id.is_none() {
            record.user_id = context.user_id.clone();
        }
        Ok(AdvanceResult::Advanced { previous })
    }

    async fn exists_for_order(&self, order_id: &str) -> DomainResult<bool> {
        Ok(self.records.lock().values().any(|r| r.order_id.as_deref() == Some(order_id)))
    }
}

// ============================================================================
// Genomics
// ============================================================================

/// In-memory payload repository and batch store.
#[derive(Default)]
pub struct InMemoryGenomicsStore {
    payloads: Mutex<Vec<GenomicsPayload>>,
    batches: Mutex<Vec<GenomicsBatch>>,
    ticker: Ticker,
}

impl InMemoryGenomicsStore {
    pub fn payloads(&self) -> Vec<GenomicsPayload> {
        self.payloads.lock().clone()
    }

    pub fn all_batches(&self) -> Vec<GenomicsBatch> {
        self.batches.lock().clone()
    }

    pub fn insert_batch(&self, batch: GenomicsBatch) {
        self.batches.lock().push(batch);
    }

    pub fn status_of(&self, batch_id: &str) -> Option<ProcessingStatus> {
        self.batches.lock().iter().find(|b| b.id == batch_id).map(|b| b.status)
    }
}

#[async_trait]
impl GenomicsPayloadRepository for InMemoryGenomicsStore {
    async fn latest_cursor(&self) -> DomainResult<Option<String>> {
        Ok(self.payloads.lock().last().map(|p| p.next_timestamp.clone()))
    }

    async fn save_payload_with_batches(
        &self,
        payload: &GenomicsPayload,
        batches: &[GenomicsBatch],
    ) -> DomainResult<()> {
        self.payloads.lock().push(payload.clone());
        self.batches.lock().extend(batches.iter().cloned());
        Ok(())
    }

    async fn get_payload(&self, payload_id: &str) -> DomainResult<GenomicsPayload> {
        self.payloads
            .lock()
            .iter()
            .find(|p| p.id == payload_id)
            .cloned()
            .ok_or_else(|| CohortSyncError::NotFound(payload_id.to_string()))
    }
}

#[async_trait]
impl GenomicsBatchStore for InMemoryGenomicsStore {
    async fn get_batch(&self, batch_id: &str) -> DomainResult<GenomicsBatch> {
        self.batches
            .lock()
            .iter()
            .find(|b| b.id == batch_id)
            .cloned()
            .ok_or_else(|| CohortSyncError::NotFound(batch_id.to_string()))
    }

    async fn list_by_statuses(
        &self,
        statuses: &[ProcessingStatus],
        limit: Option<usize>,
    ) -> DomainResult<Vec<GenomicsBatch>> {
        let mut selected: Vec<GenomicsBatch> = self
            .batches
            .lock()
            .iter()
            .filter(|b| statuses.contains(&b.status))
            .cloned()
            .collect();
        selected.sort_by(|a, b| a.created_on.cmp(&b.created_on).then(a.id.cmp(&b.id)));
        if let Some(limit) = limit {
            selected.truncate(limit);
        }
        Ok(selected)
    }

    async fn batches_for_payload(&self, payload_id: &str) -> DomainResult<Vec<GenomicsBatch>> {
        Ok(self.batches.lock().iter().filter(|b| b.payload_id == payload_id).cloned().collect())
    }

    async fn update_status(
        &self,
        batch_id: &str,
        status: ProcessingStatus,
        error_details: Option<&str>,
    ) -> DomainResult<()> {
        let tick = self.ticker.next();
        let mut batches = self.batches.lock();
        let batch = batches
            .iter_mut()
            .find(|b| b.id == batch_id)
            .ok_or_else(|| CohortSyncError::NotFound(batch_id.to_string()))?;
        batch.status = status;
        batch.error_details = error_details.map(str::to_string);
        batch.updated_on = tick;
        Ok(())
    }

    async fn stats(&self) -> DomainResult<BatchStats> {
        let mut stats = BatchStats::default();
        for batch in self.batches.lock().iter() {
            match batch.status {
                ProcessingStatus::Pending => stats.pending += 1,
                ProcessingStatus::Processing => stats.processing += 1,
                ProcessingStatus::Retry => stats.retry += 1,
                ProcessingStatus::Error => stats.error += 1,
                ProcessingStatus::Complete => stats.complete += 1,
            }
        }
        Ok(stats)
    }
}

// ============================================================================
// Sync
// ============================================================================

/// In-memory retry queue keyed by (subject, change type).
#[derive(Default)]
pub struct InMemoryRetryRepository {
    entries: Mutex<HashMap<(String, ChangeType), SyncRetryEntry>>,
    ticker: Ticker,
}

impl InMemoryRetryRepository {
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn seed(&self, entry: SyncRetryEntry) {
        self.entries.lock().insert((entry.subject_id.clone(), entry.change_type), entry);
    }
}

#[async_trait]
impl SyncRetryRepository for InMemoryRetryRepository {
    async fn upsert_failure(
        &self,
        subject_id: &str,
        change_type: ChangeType,
        payload: &str,
        error_details: Option<&str>,
    ) -> DomainResult<SyncRetryEntry> {
        let now = self.ticker.next();
        let mut entries = self.entries.lock();
        let entry = entries
            .entry((subject_id.to_string(), change_type))
            .and_modify(|e| {
                e.retry_count += 1;
                e.payload = payload.to_string();
                e.error_details = error_details.map(str::to_string);
                e.updated_on = now;
            })
            .or_insert_with(|| SyncRetryEntry {
                subject_id: subject_id.to_string(),
                change_type,
                payload: payload.to_string(),
                retry_count: 0,
                error_details: error_details.map(str::to_string),
                created_on: now,
                updated_on: now,
            });
        Ok(entry.clone())
    }

    async fn delete(&self, subject_id: &str, change_type: ChangeType) -> DomainResult<bool> {
        Ok(self.entries.lock().remove(&(subject_id.to_string(), change_type)).is_some())
    }

    async fn get(
        &self,
        subject_id: &str,
        change_type: ChangeType,
    ) -> DomainResult<Option<SyncRetryEntry>> {
        Ok(self.entries.lock().get(&(subject_id.to_string(), change_type)).cloned())
    }

    async fn list_eligible(
        &self,
        max_retry: i32,
        limit: usize,
    ) -> DomainResult<Vec<SyncRetryEntry>> {
        let mut eligible: Vec<SyncRetryEntry> =
            self.entries.lock().values().filter(|e| e.retry_count < max_retry).cloned().collect();
        eligible.sort_by_key(|e| e.updated_on);
        eligible.truncate(limit);
        Ok(eligible)
    }

    async fn list_exhausted(&self, max_retry: i32) -> DomainResult<Vec<SyncRetryEntry>> {
        Ok(self.entries.lock().values().filter(|e| e.retry_count >= max_retry).cloned().collect())
    }
}

/// In-memory synced snapshot table.
#[derive(Default)]
pub struct InMemorySnapshotRepository {
    snapshots: Mutex<HashMap<(String, ChangeType), SyncedSnapshot>>,
}

#[async_trait]
impl SyncedSnapshotRepository for InMemorySnapshotRepository {
    async fn get(
        &self,
        subject_id: &str,
        change_type: ChangeType,
    ) -> DomainResult<Option<SyncedSnapshot>> {
        Ok(self.snapshots.lock().get(&(subject_id.to_string(), change_type)).cloned())
    }

    async fn upsert(
        &self,
        subject_id: &str,
        change_type: ChangeType,
        payload: &serde_json::Value,
    ) -> DomainResult<()> {
        self.snapshots.lock().insert(
            (subject_id.to_string(), change_type),
            SyncedSnapshot {
                subject_id: subject_id.to_string(),
                change_type,
                payload: payload.clone(),
                updated_on: 0,
            },
        );
        Ok(())
    }
}

/// In-memory participant directory.
#[derive(Default)]
pub struct InMemoryDirectory {
    links: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl ParticipantDirectory for InMemoryDirectory {
    async fn partner_id_for_subject(&self, subject_id: &str) -> DomainResult<Option<String>> {
        Ok(self.links.lock().get(subject_id).cloned())
    }

    async fn subject_for_partner_id(
        &self,
        partner_participant_id: &str,
    ) -> DomainResult<Option<String>> {
        Ok(self
            .links
            .lock()
            .iter()
            .find(|(_, partner)| partner.as_str() == partner_participant_id)
            .map(|(subject, _)| subject.clone()))
    }

    async fn link(&self, subject_id: &str, partner_participant_id: &str) -> DomainResult<()> {
        self.links.lock().insert(subject_id.to_string(), partner_participant_id.to_string());
        Ok(())
    }
}
