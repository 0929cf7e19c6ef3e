//! SQLite order tracking store
//!
//! The compare-and-set rule lives in the UPDATE's WHERE clause so concurrent
//! writers for one identifier serialize on SQLite's write lock.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use cohortsync_common::storage::{SqliteConnection, StorageError, StorageResult};
use cohortsync_core::{AdvanceResult, OrderTrackingStore, StatusAdvance};
use cohortsync_domain::{IdentifierKind, Result as DomainResult, TrackingRecord, TrackingStatus};
use rusqlite::{params, OptionalExtension, Row};
use tokio::task;

use super::manager::{map_join_error, map_storage_error, DbManager};
use super::parse_text;

/// SQLite-backed [`OrderTrackingStore`].
pub struct SqliteOrderTrackingStore {
    db: Arc<DbManager>,
}

impl SqliteOrderTrackingStore {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl OrderTrackingStore for SqliteOrderTrackingStore {
    async fn get(
        &self,
        identifier: &str,
        kind: IdentifierKind,
    ) -> DomainResult<Option<TrackingRecord>> {
        let db = Arc::clone(&self.db);
        let identifier = identifier.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<TrackingRecord>> {
            let conn = db.get_connection()?;
            query_record(&conn, &identifier, kind).map_err(map_storage_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn insert_if_absent(&self, record: &TrackingRecord) -> DomainResult<bool> {
        let db = Arc::clone(&self.db);
        let record = record.clone();

        task::spawn_blocking(move || -> DomainResult<bool> {
            let conn = db.get_connection()?;
            insert_record(&conn, &record).map_err(map_storage_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn advance_status(&self, advance: &StatusAdvance) -> DomainResult<AdvanceResult> {
        let db = Arc::clone(&self.db);
        let advance = advance.clone();

        task::spawn_blocking(move || -> DomainResult<AdvanceResult> {
            let mut conn = db.get_connection()?;
            advance_status_sql(&mut conn, &advance).map_err(map_storage_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn exists_for_order(&self, order_id: &str) -> DomainResult<bool> {
        let db = Arc::clone(&self.db);
        let order_id = order_id.to_string();

        task::spawn_blocking(move || -> DomainResult<bool> {
            let conn = db.get_connection()?;
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM tracking_records WHERE order_id = ?1)",
                params![order_id],
                |row| row.get::<_, bool>(0),
            )
            .map_err(map_storage_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

// ============================================================================
// SQL Operations (synchronous)
// ============================================================================

const RECORD_COLUMNS: &str = "identifier, identifier_kind, order_id, participant_id, user_id,
                              last_status, last_rank, created_on, updated_on";

fn query_record(
    conn: &SqliteConnection,
    identifier: &str,
    kind: IdentifierKind,
) -> StorageResult<Option<TrackingRecord>> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM tracking_records WHERE identifier = ?1 AND identifier_kind = ?2"
    );
    conn.query_optional(&sql, params![identifier, kind.as_str()], map_record_row)
}

fn insert_record(conn: &SqliteConnection, record: &TrackingRecord) -> StorageResult<bool> {
    let inserted = conn.execute(
        "INSERT INTO tracking_records (identifier, identifier_kind, order_id, participant_id,
                                       user_id, last_status, last_rank, created_on, updated_on)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT (identifier, identifier_kind) DO NOTHING",
        params![
            &record.identifier,
            record.identifier_kind.as_str(),
            &record.order_id,
            &record.participant_id,
            &record.user_id,
            record.last_status.map(|s| s.as_str()),
            record.last_rank,
            record.created_on,
            record.updated_on,
        ],
    )?;
    Ok(inserted == 1)
}

fn advance_status_sql(
    conn: &mut SqliteConnection,
    advance: &StatusAdvance,
) -> StorageResult<AdvanceResult> {
    let now = Utc::now().timestamp_millis();
    let kind = advance.identifier_kind.as_str();
    let tx = conn.immediate_transaction()?;

    let previous: Option<TrackingStatus> = tx
        .query_row(
            "SELECT last_status FROM tracking_records WHERE identifier = ?1 AND identifier_kind = ?2",
            params![&advance.identifier, kind],
            |row| parse_status(row, 0),
        )
        .optional()?
        .ok_or_else(|| {
            StorageError::NotFound(format!("tracking record {} ({kind})", advance.identifier))
        })?;

    let context = &advance.context;
    let changed = tx.execute(
        "UPDATE tracking_records
         SET last_status = ?1,
             last_rank = CASE WHEN ?2 THEN last_rank ELSE ?3 END,
             order_id = COALESCE(order_id, ?7),
             participant_id = COALESCE(participant_id, ?8),
             user_id = COALESCE(user_id, ?9),
             updated_on = ?4
         WHERE identifier = ?5 AND identifier_kind = ?6
           AND (?2 OR last_rank IS NULL OR last_rank < ?3)",
        params![
            advance.status.as_str(),
            advance.unconditional,
            advance.rank,
            now,
            &advance.identifier,
            kind,
            &context.order_id,
            &context.participant_id,
            &context.user_id,
        ],
    )?;
    tx.commit()?;

    Ok(if changed == 1 {
        AdvanceResult::Advanced { previous }
    } else {
        AdvanceResult::Unchanged { current: previous }
    })
}

fn parse_status(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<TrackingStatus>> {
    row.get::<_, Option<String>>(idx)?
        .map(|value| parse_text::<TrackingStatus>(idx, &value))
        .transpose()
}

fn map_record_row(row: &Row<'_>) -> rusqlite::Result<TrackingRecord> {
    let kind: String = row.get(1)?;

    Ok(TrackingRecord {
        identifier: row.get(0)?,
        identifier_kind: parse_text(1, &kind)?,
        order_id: row.get(2)?,
        participant_id: row.get(3)?,
        user_id: row.get(4)?,
        last_status: parse_status(row, 5)?,
        last_rank: row.get(6)?,
        created_on: row.get(7)?,
        updated_on: row.get(8)?,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use cohortsync_core::RecordContext;
    use cohortsync_domain::CarrierStatus;
    use tempfile::TempDir;

    use super::*;

    const KIND: IdentifierKind = IdentifierKind::ParticipantTrackingId;

    fn setup_repository() -> (SqliteOrderTrackingStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = DbManager::new(temp_dir.path().join("tracking.db"), 4).unwrap();
        db.run_migrations().unwrap();
        (SqliteOrderTrackingStore::new(Arc::new(db)), temp_dir)
    }

    fn record(identifier: &str, status: CarrierStatus, rank: Option<i32>) -> TrackingRecord {
        TrackingRecord {
            identifier: identifier.to_string(),
            identifier_kind: KIND,
            order_id: Some("ORD-1".into()),
            participant_id: None,
            user_id: None,
            last_status: Some(status.into()),
            last_rank: rank,
            created_on: 1,
            updated_on: 1,
        }
    }

    fn advance(identifier: &str, status: CarrierStatus, rank: i32) -> StatusAdvance {
        StatusAdvance {
            identifier: identifier.to_string(),
            identifier_kind: KIND,
            status: status.into(),
            rank,
            unconditional: false,
            context: RecordContext::default(),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn insert_if_absent_only_inserts_once() {
        let (store, _dir) = setup_repository();

        assert!(store.insert_if_absent(&record("1Z", CarrierStatus::InTransit, Some(3))).await.unwrap());
        assert!(!store.insert_if_absent(&record("1Z", CarrierStatus::Delivered, Some(4))).await.unwrap());

        let stored = store.get("1Z", KIND).await.unwrap().unwrap();
        assert_eq!(stored.last_status, Some(CarrierStatus::InTransit.into()));
        assert!(store.exists_for_order("ORD-1").await.unwrap());
        assert!(!store.exists_for_order("ORD-2").await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn advance_requires_strictly_higher_rank() {
        let (store, _dir) = setup_repository();
        store.insert_if_absent(&record("1Z", CarrierStatus::Delivered, Some(4))).await.unwrap();

        let stale = store.advance_status(&advance("1Z", CarrierStatus::InTransit, 3)).await.unwrap();
        let equal = store.advance_status(&advance("1Z", CarrierStatus::Delivered, 4)).await.unwrap();

        let current = Some(CarrierStatus::Delivered.into());
        assert_eq!(stale, AdvanceResult::Unchanged { current });
        assert_eq!(equal, AdvanceResult::Unchanged { current });
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unconditional_advance_keeps_rank() {
        let (store, _dir) = setup_repository();
        store.insert_if_absent(&record("1Z", CarrierStatus::Delivered, Some(4))).await.unwrap();

        let error = StatusAdvance {
            unconditional: true,
            ..advance("1Z", CarrierStatus::Error, -1)
        };
        let result = store.advance_status(&error).await.unwrap();

        assert_eq!(result, AdvanceResult::Advanced { previous: Some(CarrierStatus::Delivered.into()) });
        let stored = store.get("1Z", KIND).await.unwrap().unwrap();
        assert_eq!(stored.last_status, Some(CarrierStatus::Error.into()));
        assert_eq!(stored.last_rank, Some(4));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn null_rank_accepts_any_ranked_status() {
        let (store, _dir) = setup_repository();
        store.insert_if_absent(&record("1Z", CarrierStatus::Error, None)).await.unwrap();

        let result = store.advance_status(&advance("1Z", CarrierStatus::PreTransit, 2)).await.unwrap();

        assert!(matches!(result, AdvanceResult::Advanced { .. }));
        assert_eq!(store.get("1Z", KIND).await.unwrap().unwrap().last_rank, Some(2));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_advances_apply_the_highest_rank() {
        let (store, _dir) = setup_repository();
        let store = Arc::new(store);
        store.insert_if_absent(&record("1Z", CarrierStatus::PreTransit, Some(2))).await.unwrap();

        let handles: Vec<_> = [(CarrierStatus::Delivered, 4), (CarrierStatus::InTransit, 3)]
            .into_iter()
            .map(|(status, rank)| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.advance_status(&advance("1Z", status, rank)).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stored = store.get("1Z", KIND).await.unwrap().unwrap();
        assert_eq!(stored.last_status, Some(CarrierStatus::Delivered.into()));
        assert_eq!(stored.last_rank, Some(4));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn accepted_advance_fills_missing_links_only() {
        let (store, _dir) = setup_repository();
        let unlinked = TrackingRecord { order_id: None, ..record("1Z", CarrierStatus::PreTransit, Some(2)) };
        store.insert_if_absent(&unlinked).await.unwrap();

        let linked = |status, rank, order: &str| StatusAdvance {
            context: RecordContext {
                order_id: Some(order.to_string()),
                participant_id: Some("P-1".into()),
                user_id: None,
            },
            ..advance("1Z", status, rank)
        };

        let stale = store.advance_status(&linked(CarrierStatus::PreTransit, 1, "ORD-X")).await.unwrap();
        assert!(matches!(stale, AdvanceResult::Unchanged { .. }));
        assert!(!store.exists_for_order("ORD-X").await.unwrap());

        store.advance_status(&linked(CarrierStatus::InTransit, 3, "ORD-B")).await.unwrap();
        store.advance_status(&linked(CarrierStatus::Delivered, 4, "ORD-C")).await.unwrap();

        let stored = store.get("1Z", KIND).await.unwrap().unwrap();
        assert_eq!(stored.order_id.as_deref(), Some("ORD-B"));
        assert_eq!(stored.participant_id.as_deref(), Some("P-1"));
        assert_eq!(stored.user_id, None);
        assert!(store.exists_for_order("ORD-B").await.unwrap());
        assert!(!store.exists_for_order("ORD-C").await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn advance_on_missing_record_is_not_found() {
        let (store, _dir) = setup_repository();
        let result = store.advance_status(&advance("nope", CarrierStatus::InTransit, 3)).await;
        assert!(matches!(result, Err(cohortsync_domain::CohortSyncError::NotFound(_))));
    }
}
