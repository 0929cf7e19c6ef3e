//! SQLite connection pool
//!
//! r2d2-based pooling with pragmas applied on every new connection.

use std::path::Path;
use std::time::Instant;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use tracing::{debug, info, instrument, warn};

use super::config::SqlitePoolConfig;
use super::connection::SqliteConnection;
use super::pragmas::apply_connection_pragmas;
use crate::storage::error::{StorageError, StorageResult};

/// Pool of SQLite connections for one database file.
#[derive(Debug)]
pub struct SqlitePool {
    pool: Pool<SqliteConnectionManager>,
    config: SqlitePoolConfig,
}

impl SqlitePool {
    /// Create a new connection pool
    ///
    /// Builds the r2d2 pool and checks out one connection so a bad path or
    /// unreadable file fails here rather than on first use.
    #[instrument(fields(db_path = ?path, pool_size = config.max_size))]
    pub fn new(path: &Path, config: SqlitePoolConfig) -> StorageResult<Self> {
        let pool_config = config.clone();
        let manager = SqliteConnectionManager::file(path).with_init(move |conn| {
            apply_connection_pragmas(conn, &pool_config)
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
        });

        let pool = Pool::builder()
            .max_size(config.max_size)
            .connection_timeout(config.connection_timeout)
            .build(manager)
            .map_err(|e| {
                warn!("Failed to create connection pool: {e}");
                StorageError::Connection(format!("Failed to create pool: {e}"))
            })?;

        drop(pool.get().map_err(|e| {
            StorageError::Connection(format!("Failed to get test connection: {e}"))
        })?);

        info!("SQLite pool created with {} connections", config.max_size);

        Ok(Self { pool, config })
    }

    /// Check out a connection.
    #[instrument(skip(self), fields(pool_size = self.config.max_size))]
    pub fn get_connection(&self) -> StorageResult<SqliteConnection> {
        let start = Instant::now();

        match self.pool.get() {
            Ok(conn) => {
                debug!(elapsed_ms = start.elapsed().as_millis() as u64, "connection acquired");
                Ok(SqliteConnection::new(conn))
            }
            Err(e) => {
                if e.to_string().to_lowercase().contains("timed out") {
                    warn!("Connection timeout after {:?}", self.config.connection_timeout);
                    Err(StorageError::Timeout(self.config.connection_timeout.as_secs()))
                } else {
                    warn!("Connection error: {e}");
                    Err(StorageError::Connection(format!("Failed to get connection: {e}")))
                }
            }
        }
    }

    /// Maximum pool size.
    pub fn max_size(&self) -> u32 {
        self.config.max_size
    }

    /// Idle and total connection counts.
    pub fn state(&self) -> (u32, u32) {
        let state = self.pool.state();
        (state.idle_connections, state.connections)
    }
}
