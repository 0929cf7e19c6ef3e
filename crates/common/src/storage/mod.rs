//! Storage primitives for SQLite-backed repositories
//!
//! Provides an r2d2 connection pool, per-connection pragmas and the storage
//! error type used by the infrastructure repositories.

pub mod error;
pub mod sqlite;

pub use error::{StorageError, StorageResult};
pub use sqlite::{
    apply_connection_pragmas, SqliteConnection, SqlitePool, SqlitePoolConfig, SqliteStatement,
};
