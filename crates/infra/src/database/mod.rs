//! SQLite implementations of the core ports

pub mod genomics_repository;
pub mod manager;
pub mod participant_repository;
pub mod snapshot_repository;
pub mod sync_retry_repository;
pub mod tracking_repository;

use std::str::FromStr;

pub use genomics_repository::SqliteGenomicsRepository;
pub use manager::DbManager;
pub use participant_repository::SqliteParticipantDirectory;
pub use snapshot_repository::SqliteSyncedSnapshotRepository;
pub use sync_retry_repository::SqliteSyncRetryRepository;
pub use tracking_repository::SqliteOrderTrackingStore;

/// Parse a TEXT column into a domain enum.
pub(crate) fn parse_text<T>(idx: usize, value: &str) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|err: T::Err| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, err.to_string())),
        )
    })
}
