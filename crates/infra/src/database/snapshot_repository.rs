//! SQLite store of last confirmed partner payloads

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use cohortsync_core::SyncedSnapshotRepository;
use cohortsync_domain::{ChangeType, Result as DomainResult, SyncedSnapshot};
use rusqlite::{params, Row};
use tokio::task;

use super::manager::{map_join_error, map_storage_error, DbManager};
use super::parse_text;

/// SQLite-backed [`SyncedSnapshotRepository`].
pub struct SqliteSyncedSnapshotRepository {
    db: Arc<DbManager>,
}

impl SqliteSyncedSnapshotRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SyncedSnapshotRepository for SqliteSyncedSnapshotRepository {
    async fn get(
        &self,
        subject_id: &str,
        change_type: ChangeType,
    ) -> DomainResult<Option<SyncedSnapshot>> {
        let db = Arc::clone(&self.db);
        let subject_id = subject_id.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<SyncedSnapshot>> {
            let conn = db.get_connection()?;
            conn.query_optional(
                "SELECT subject_id, change_type, payload, updated_on
                 FROM synced_snapshots WHERE subject_id = ?1 AND change_type = ?2",
                params![subject_id, change_type.as_str()],
                map_snapshot_row,
            )
            .map_err(map_storage_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn upsert(
        &self,
        subject_id: &str,
        change_type: ChangeType,
        payload: &serde_json::Value,
    ) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let subject_id = subject_id.to_string();
        let payload = serde_json::to_string(payload)?;

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "INSERT INTO synced_snapshots (subject_id, change_type, payload, updated_on)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (subject_id, change_type) DO UPDATE SET
                     payload = excluded.payload,
                     updated_on = excluded.updated_on",
                params![subject_id, change_type.as_str(), payload, Utc::now().timestamp_millis()],
            )
            .map_err(map_storage_error)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}

fn map_snapshot_row(row: &Row<'_>) -> rusqlite::Result<SyncedSnapshot> {
    let change_type: String = row.get(1)?;
    let payload: String = row.get(2)?;

    Ok(SyncedSnapshot {
        subject_id: row.get(0)?,
        change_type: parse_text(1, &change_type)?,
        payload: serde_json::from_str(&payload).map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(err))
        })?,
        updated_on: row.get(3)?,
    })
}
