//! SQLite genomics payload and batch storage

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use cohortsync_common::storage::{SqliteConnection, StorageError, StorageResult};
use cohortsync_core::{GenomicsBatchStore, GenomicsPayloadRepository};
use cohortsync_domain::{
    BatchStats, GenomicsBatch, GenomicsPayload, ProcessingStatus, Result as DomainResult,
};
use rusqlite::{params, Row, ToSql};
use tokio::task;
use tracing::debug;

use super::manager::{map_join_error, map_storage_error, DbManager};
use super::parse_text;

/// SQLite implementation of both genomics ports.
pub struct SqliteGenomicsRepository {
    db: Arc<DbManager>,
}

impl SqliteGenomicsRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl GenomicsPayloadRepository for SqliteGenomicsRepository {
    async fn latest_cursor(&self) -> DomainResult<Option<String>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Option<String>> {
            let conn = db.get_connection()?;
            conn.query_optional(
                "SELECT next_timestamp FROM genomics_payloads ORDER BY created_on DESC, rowid DESC LIMIT 1",
                params![],
                |row| row.get(0),
            )
            .map_err(map_storage_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn save_payload_with_batches(
        &self,
        payload: &GenomicsPayload,
        batches: &[GenomicsBatch],
    ) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let payload = payload.clone();
        let batches = batches.to_vec();

        task::spawn_blocking(move || -> DomainResult<()> {
            let mut conn = db.get_connection()?;
            insert_payload_with_batches(&mut conn, &payload, &batches).map_err(map_storage_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn get_payload(&self, payload_id: &str) -> DomainResult<GenomicsPayload> {
        let db = Arc::clone(&self.db);
        let payload_id = payload_id.to_string();

        task::spawn_blocking(move || -> DomainResult<GenomicsPayload> {
            let conn = db.get_connection()?;
            conn.query_optional(
                "SELECT id, raw_payload, requested_timestamp, next_timestamp, record_count, status, created_on
                 FROM genomics_payloads WHERE id = ?1",
                params![payload_id],
                map_payload_row,
            )
            .and_then(|found| found.ok_or_else(|| StorageError::NotFound(format!("payload {payload_id}"))))
            .map_err(map_storage_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl GenomicsBatchStore for SqliteGenomicsRepository {
    async fn get_batch(&self, batch_id: &str) -> DomainResult<GenomicsBatch> {
        let db = Arc::clone(&self.db);
        let batch_id = batch_id.to_string();

        task::spawn_blocking(move || -> DomainResult<GenomicsBatch> {
            let conn = db.get_connection()?;
            query_batch_by_id(&conn, &batch_id).map_err(map_storage_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn list_by_statuses(
        &self,
        statuses: &[ProcessingStatus],
        limit: Option<usize>,
    ) -> DomainResult<Vec<GenomicsBatch>> {
        let db = Arc::clone(&self.db);
        let statuses = statuses.to_vec();

        task::spawn_blocking(move || -> DomainResult<Vec<GenomicsBatch>> {
            let conn = db.get_connection()?;
            query_batches_by_statuses(&conn, &statuses, limit).map_err(map_storage_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn batches_for_payload(&self, payload_id: &str) -> DomainResult<Vec<GenomicsBatch>> {
        let db = Arc::clone(&self.db);
        let payload_id = payload_id.to_string();

        task::spawn_blocking(move || -> DomainResult<Vec<GenomicsBatch>> {
            let conn = db.get_connection()?;
            let sql = format!(
                "SELECT {BATCH_COLUMNS} FROM genomics_batches WHERE payload_id = ?1 ORDER BY created_on, rowid"
            );
            let mut stmt = conn.prepare(&sql).map_err(map_storage_error)?;
            stmt.query_map(params![payload_id], map_batch_row).map_err(map_storage_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn update_status(
        &self,
        batch_id: &str,
        status: ProcessingStatus,
        error_details: Option<&str>,
    ) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let batch_id = batch_id.to_string();
        let error_details = error_details.map(str::to_string);

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            update_batch_status_sql(&conn, &batch_id, status, error_details.as_deref())
                .map_err(map_storage_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn stats(&self) -> DomainResult<BatchStats> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<BatchStats> {
            let conn = db.get_connection()?;
            query_batch_stats(&conn).map_err(map_storage_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

// ============================================================================
// SQL Operations (synchronous)
// ============================================================================

const BATCH_COLUMNS: &str = "id, payload_id, batch_payload, batch_size, status, retry_count,
                             error_details, created_on, updated_on";

fn insert_payload_with_batches(
    conn: &mut SqliteConnection,
    payload: &GenomicsPayload,
    batches: &[GenomicsBatch],
) -> StorageResult<()> {
    let tx = conn.transaction()?;

    tx.execute(
        "INSERT INTO genomics_payloads (id, raw_payload, requested_timestamp, next_timestamp,
                                        record_count, status, created_on)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            &payload.id,
            &payload.raw_payload,
            &payload.requested_timestamp,
            &payload.next_timestamp,
            payload.record_count,
            payload.status.as_str(),
            payload.created_on,
        ],
    )?;

    {
        let mut stmt = tx.prepare(
            "INSERT INTO genomics_batches (id, payload_id, batch_payload, batch_size, status,
                                           retry_count, error_details, created_on, updated_on)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )?;
        for batch in batches {
            stmt.execute(params![
                &batch.id,
                &batch.payload_id,
                &batch.batch_payload,
                batch.batch_size,
                batch.status.as_str(),
                batch.retry_count,
                &batch.error_details,
                batch.created_on,
                batch.updated_on,
            ])?;
        }
    }

    tx.commit()?;
    debug!(payload_id = %payload.id, batches = batches.len(), "payload and batches committed");
    Ok(())
}

fn query_batch_by_id(conn: &SqliteConnection, batch_id: &str) -> StorageResult<GenomicsBatch> {
    let sql = format!("SELECT {BATCH_COLUMNS} FROM genomics_batches WHERE id = ?1");
    conn.query_optional(&sql, params![batch_id], map_batch_row)?
        .ok_or_else(|| StorageError::NotFound(format!("batch {batch_id}")))
}

fn query_batches_by_statuses(
    conn: &SqliteConnection,
    statuses: &[ProcessingStatus],
    limit: Option<usize>,
) -> StorageResult<Vec<GenomicsBatch>> {
    if statuses.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = (1..=statuses.len()).map(|i| format!("?{i}")).collect::<Vec<_>>().join(", ");
    let limit_clause = limit.map(|n| format!(" LIMIT {n}")).unwrap_or_default();
    let sql = format!(
        "SELECT {BATCH_COLUMNS} FROM genomics_batches
         WHERE status IN ({placeholders})
         ORDER BY created_on ASC, rowid ASC{limit_clause}"
    );

    let names: Vec<&'static str> = statuses.iter().map(|s| s.as_str()).collect();
    let params: Vec<&dyn ToSql> = names.iter().map(|name| name as &dyn ToSql).collect();

    let mut stmt = conn.prepare(&sql)?;
    stmt.query_map(&params, map_batch_row)
}

fn update_batch_status_sql(
    conn: &SqliteConnection,
    batch_id: &str,
    status: ProcessingStatus,
    error_details: Option<&str>,
) -> StorageResult<()> {
    let updated = conn.execute(
        "UPDATE genomics_batches SET status = ?1, error_details = ?2, updated_on = ?3 WHERE id = ?4",
        params![status.as_str(), error_details, Utc::now().timestamp_millis(), batch_id],
    )?;
    if updated == 0 {
        return Err(StorageError::NotFound(format!("batch {batch_id}")));
    }
    Ok(())
}

fn query_batch_stats(conn: &SqliteConnection) -> StorageResult<BatchStats> {
    let sql = "SELECT
                   COALESCE(SUM(CASE WHEN status = 'PENDING' THEN 1 ELSE 0 END), 0),
                   COALESCE(SUM(CASE WHEN status = 'PROCESSING' THEN 1 ELSE 0 END), 0),
                   COALESCE(SUM(CASE WHEN status = 'RETRY' THEN 1 ELSE 0 END), 0),
                   COALESCE(SUM(CASE WHEN status = 'ERROR' THEN 1 ELSE 0 END), 0),
                   COALESCE(SUM(CASE WHEN status = 'COMPLETE' THEN 1 ELSE 0 END), 0)
               FROM genomics_batches";

    conn.query_row(sql, params![], |row| {
        Ok(BatchStats {
            pending: row.get(0)?,
            processing: row.get(1)?,
            retry: row.get(2)?,
            error: row.get(3)?,
            complete: row.get(4)?,
        })
    })
}

fn map_payload_row(row: &Row<'_>) -> rusqlite::Result<GenomicsPayload> {
    let status: String = row.get(5)?;

    Ok(GenomicsPayload {
        id: row.get(0)?,
        raw_payload: row.get(1)?,
        requested_timestamp: row.get(2)?,
        next_timestamp: row.get(3)?,
        record_count: row.get(4)?,
        status: parse_text(5, &status)?,
        created_on: row.get(6)?,
    })
}

fn map_batch_row(row: &Row<'_>) -> rusqlite::Result<GenomicsBatch> {
    let status: String = row.get(4)?;

    Ok(GenomicsBatch {
        id: row.get(0)?,
        payload_id: row.get(1)?,
        batch_payload: row.get(2)?,
        batch_size: row.get(3)?,
        status: parse_text(4, &status)?,
        retry_count: row.get(5)?,
        error_details: row.get(6)?,
        created_on: row.get(7)?,
        updated_on: row.get(8)?,
    })
}

// ============================================================================
// Tests
// ============================================================================
