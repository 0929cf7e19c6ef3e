//! SQLite retry queue for partner writes

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use cohortsync_common::storage::{SqliteConnection, StorageResult};
use cohortsync_core::SyncRetryRepository;
use cohortsync_domain::{ChangeType, Result as DomainResult, SyncRetryEntry};
use rusqlite::{params, Row};
use tokio::task;

use super::manager::{map_join_error, map_storage_error, DbManager};
use super::parse_text;

/// SQLite-backed [`SyncRetryRepository`].
pub struct SqliteSyncRetryRepository {
    db: Arc<DbManager>,
}

impl SqliteSyncRetryRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SyncRetryRepository for SqliteSyncRetryRepository {
    async fn upsert_failure(
        &self,
        subject_id: &str,
        change_type: ChangeType,
        payload: &str,
        error_details: Option<&str>,
    ) -> DomainResult<SyncRetryEntry> {
        let db = Arc::clone(&self.db);
        let subject_id = subject_id.to_string();
        let payload = payload.to_string();
        let error_details = error_details.map(str::to_string);

        task::spawn_blocking(move || -> DomainResult<SyncRetryEntry> {
            let conn = db.get_connection()?;
            upsert_failure_sql(&conn, &subject_id, change_type, &payload, error_details.as_deref())
                .map_err(map_storage_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn delete(&self, subject_id: &str, change_type: ChangeType) -> DomainResult<bool> {
        let db = Arc::clone(&self.db);
        let subject_id = subject_id.to_string();

        task::spawn_blocking(move || -> DomainResult<bool> {
            let conn = db.get_connection()?;
            let deleted = conn
                .execute(
                    "DELETE FROM sync_retry_entries WHERE subject_id = ?1 AND change_type = ?2",
                    params![subject_id, change_type.as_str()],
                )
                .map_err(map_storage_error)?;
            Ok(deleted > 0)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn get(
        &self,
        subject_id: &str,
        change_type: ChangeType,
    ) -> DomainResult<Option<SyncRetryEntry>> {
        let db = Arc::clone(&self.db);
        let subject_id = subject_id.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<SyncRetryEntry>> {
            let conn = db.get_connection()?;
            query_entry(&conn, &subject_id, change_type).map_err(map_storage_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn list_eligible(
        &self,
        max_retry: i32,
        limit: usize,
    ) -> DomainResult<Vec<SyncRetryEntry>> {
        let db = Arc::clone(&self.db);
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        task::spawn_blocking(move || -> DomainResult<Vec<SyncRetryEntry>> {
            let conn = db.get_connection()?;
            let sql = format!(
                "SELECT {ENTRY_COLUMNS} FROM sync_retry_entries
                 WHERE retry_count < ?1
                 ORDER BY updated_on ASC, rowid ASC
                 LIMIT ?2"
            );
            let mut stmt = conn.prepare(&sql).map_err(map_storage_error)?;
            stmt.query_map(params![max_retry, limit], map_entry_row).map_err(map_storage_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn list_exhausted(&self, max_retry: i32) -> DomainResult<Vec<SyncRetryEntry>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Vec<SyncRetryEntry>> {
            let conn = db.get_connection()?;
            let sql = format!(
                "SELECT {ENTRY_COLUMNS} FROM sync_retry_entries
                 WHERE retry_count >= ?1
                 ORDER BY updated_on ASC"
            );
            let mut stmt = conn.prepare(&sql).map_err(map_storage_error)?;
            stmt.query_map(params![max_retry], map_entry_row).map_err(map_storage_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

// ============================================================================
// SQL Operations (synchronous)
// ============================================================================

const ENTRY_COLUMNS: &str =
    "subject_id, change_type, payload, retry_count, error_details, created_on, updated_on";

/// Insert at `retry_count = 0` or bump the existing row, in one statement.
fn upsert_failure_sql(
    conn: &SqliteConnection,
    subject_id: &str,
    change_type: ChangeType,
    payload: &str,
    error_details: Option<&str>,
) -> StorageResult<SyncRetryEntry> {
    let now = Utc::now().timestamp_millis();
    let sql = format!(
        "INSERT INTO sync_retry_entries (subject_id, change_type, payload, retry_count,
                                         error_details, created_on, updated_on)
         VALUES (?1, ?2, ?3, 0, ?4, ?5, ?5)
         ON CONFLICT (subject_id, change_type) DO UPDATE SET
             retry_count = retry_count + 1,
             payload = excluded.payload,
             error_details = excluded.error_details,
             updated_on = excluded.updated_on
         RETURNING {ENTRY_COLUMNS}"
    );

    conn.query_row(
        &sql,
        params![subject_id, change_type.as_str(), payload, error_details, now],
        map_entry_row,
    )
}

fn query_entry(
    conn: &SqliteConnection,
    subject_id: &str,
    change_type: ChangeType,
) -> StorageResult<Option<SyncRetryEntry>> {
    let sql = format!(
        "SELECT {ENTRY_COLUMNS} FROM sync_retry_entries WHERE subject_id = ?1 AND change_type = ?2"
    );
    conn.query_optional(&sql, params![subject_id, change_type.as_str()], map_entry_row)
}

fn map_entry_row(row: &Row<'_>) -> rusqlite::Result<SyncRetryEntry> {
    let change_type: String = row.get(1)?;

    Ok(SyncRetryEntry {
        subject_id: row.get(0)?,
        change_type: parse_text(1, &change_type)?,
        payload: row.get(2)?,
        retry_count: row.get(3)?,
        error_details: row.get(4)?,
        created_on: row.get(5)?,
        updated_on: row.get(6)?,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn setup_repository() -> (SqliteSyncRetryRepository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = DbManager::new(temp_dir.path().join("retry.db"), 4).unwrap();
        db.run_migrations().unwrap();
        (SqliteSyncRetryRepository::new(Arc::new(db)), temp_dir)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn first_failure_starts_at_zero_then_increments() {
        let (repo, _dir) = setup_repository();

        let first = repo
            .upsert_failure("s1", ChangeType::ContactInfo, "{\"v\":1}", Some("timeout"))
            .await
            .unwrap();
        let second = repo
            .upsert_failure("s1", ChangeType::ContactInfo, "{\"v\":2}", Some("503"))
            .await
            .unwrap();

        assert_eq!(first.retry_count, 0);
        assert_eq!(second.retry_count, 1);
        assert_eq!(second.payload, "{\"v\":2}");
        assert_eq!(second.error_details.as_deref(), Some("503"));
        assert_eq!(second.created_on, first.created_on);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn keys_are_independent_per_change_type() {
        let (repo, _dir) = setup_repository();

        repo.upsert_failure("s1", ChangeType::ContactInfo, "{}", None).await.unwrap();
        repo.upsert_failure("s1", ChangeType::AccountProfile, "{}", None).await.unwrap();

        assert!(repo.delete("s1", ChangeType::ContactInfo).await.unwrap());
        assert!(!repo.delete("s1", ChangeType::ContactInfo).await.unwrap());
        assert!(repo.get("s1", ChangeType::AccountProfile).await.unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn eligible_and_exhausted_split_on_max_retry() {
        let (repo, _dir) = setup_repository();

        for _ in 0..3 {
            repo.upsert_failure("tired", ChangeType::OrderTracking, "{}", None).await.unwrap();
        }
        repo.upsert_failure("fresh", ChangeType::OrderTracking, "{}", None).await.unwrap();

        let eligible = repo.list_eligible(2, 10).await.unwrap();
        let exhausted = repo.list_exhausted(2).await.unwrap();

        assert_eq!(eligible.iter().map(|e| e.subject_id.as_str()).collect::<Vec<_>>(), vec!["fresh"]);
        assert_eq!(exhausted.len(), 1);
        assert_eq!(exhausted[0].retry_count, 2);
        assert_eq!(repo.list_eligible(5, 1).await.unwrap().len(), 1);
    }
}
