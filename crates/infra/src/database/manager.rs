//! Database connection manager backed by the shared SQLite pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cohortsync_common::storage::{SqliteConnection, SqlitePool, SqlitePoolConfig, StorageError};
use cohortsync_domain::{CohortSyncError, Result};
use rusqlite::params;
use tracing::info;

use crate::errors::InfraError;

const SCHEMA_VERSION: i32 = 1;
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Owns the connection pool and the schema.
pub struct DbManager {
    pool: Arc<SqlitePool>,
    path: PathBuf,
}

impl DbManager {
    /// Open (or create) the database with the given pool size.
    pub fn new<P: AsRef<Path>>(db_path: P, pool_size: u32) -> Result<Self> {
        let path = db_path.as_ref().to_path_buf();
        let config = SqlitePoolConfig { max_size: pool_size.max(1), ..SqlitePoolConfig::default() };

        let pool = SqlitePool::new(&path, config).map_err(map_storage_error)?;

        info!(db_path = %path.display(), max_connections = pool.max_size(), "sqlite pool initialised");

        Ok(Self { pool: Arc::new(pool), path })
    }

    pub fn pool(&self) -> &Arc<SqlitePool> {
        &self.pool
    }

    /// Acquire a connection from the pool.
    pub fn get_connection(&self) -> Result<SqliteConnection> {
        self.pool.get_connection().map_err(map_storage_error)
    }

    /// Ensure the full schema exists on the current database.
    pub fn run_migrations(&self) -> Result<()> {
        let conn = self.get_connection()?;
        conn.execute_batch(SCHEMA_SQL).map_err(map_sql_error)?;
        conn.execute(
            "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?1, CAST(strftime('%s','now') AS INTEGER) * 1000)",
            params![SCHEMA_VERSION],
        )
        .map_err(map_storage_error)?;
        info!(version = SCHEMA_VERSION, "schema ready");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Verify the database answers a trivial query.
    pub fn health_check(&self) -> Result<()> {
        let conn = self.get_connection()?;
        conn.query_row("SELECT 1", params![], |row| row.get::<_, i32>(0))
            .map_err(map_storage_error)?;
        Ok(())
    }
}

fn map_sql_error(err: rusqlite::Error) -> CohortSyncError {
    InfraError::from(err).into()
}

pub(crate) fn map_storage_error(err: StorageError) -> CohortSyncError {
    InfraError::from(err).into()
}

pub(crate) fn map_join_error(err: tokio::task::JoinError) -> CohortSyncError {
    if err.is_cancelled() {
        CohortSyncError::Internal("blocking task cancelled".into())
    } else {
        CohortSyncError::Internal(format!("blocking task failed: {err}"))
    }
}
