//! Conversions from external infrastructure errors into domain errors.

use cohortsync_common::storage::StorageError;
use cohortsync_domain::CohortSyncError;
use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub CohortSyncError);

impl From<InfraError> for CohortSyncError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<CohortSyncError> for InfraError {
    fn from(value: CohortSyncError) -> Self {
        InfraError(value)
    }
}

trait IntoCohortSyncError {
    fn into_domain(self) -> CohortSyncError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → CohortSyncError */
/* -------------------------------------------------------------------------- */

impl IntoCohortSyncError for SqlError {
    fn into_domain(self) -> CohortSyncError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => {
                        CohortSyncError::Database("database is busy".into())
                    }
                    (ErrorCode::DatabaseLocked, _) => {
                        CohortSyncError::Database("database is locked".into())
                    }
                    (ErrorCode::ConstraintViolation, 2067 | 1555) => {
                        CohortSyncError::Database("unique constraint violation".into())
                    }
                    (ErrorCode::ConstraintViolation, 787) => {
                        CohortSyncError::Database("foreign key constraint violation".into())
                    }
                    _ => CohortSyncError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => CohortSyncError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                CohortSyncError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                CohortSyncError::Database(format!("invalid column type: {ty}"))
            }
            RE::InvalidPath(path) => CohortSyncError::Database(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            other => CohortSyncError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_domain())
    }
}

/* -------------------------------------------------------------------------- */
/* StorageError → CohortSyncError */
/* -------------------------------------------------------------------------- */

impl IntoCohortSyncError for StorageError {
    fn into_domain(self) -> CohortSyncError {
        match self {
            StorageError::NotFound(what) => CohortSyncError::NotFound(what),
            StorageError::Rusqlite(sql_err) => sql_err.into_domain(),
            StorageError::Timeout(seconds) => {
                CohortSyncError::Database(format!("database timeout after {seconds}s"))
            }
            StorageError::PoolExhausted => {
                CohortSyncError::Database("connection pool exhausted".into())
            }
            StorageError::InvalidConfig(message) => CohortSyncError::Config(message),
            StorageError::SerdeJson(json_err) => CohortSyncError::Serialization(json_err.to_string()),
            StorageError::Connection(message)
            | StorageError::Query(message)
            | StorageError::Migration(message) => CohortSyncError::Database(message),
            StorageError::Common(common_err) => CohortSyncError::Database(common_err.to_string()),
            StorageError::R2d2(r2d2_err) => CohortSyncError::Database(r2d2_err.to_string()),
        }
    }
}

impl From<StorageError> for InfraError {
    fn from(value: StorageError) -> Self {
        InfraError(value.into_domain())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → CohortSyncError */
/* -------------------------------------------------------------------------- */

impl IntoCohortSyncError for HttpError {
    fn into_domain(self) -> CohortSyncError {
        if self.is_timeout() {
            return CohortSyncError::Network("HTTP request timed out".into());
        }

        if self.is_connect() {
            return CohortSyncError::Network("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            return status_to_error(status.as_u16(), status.canonical_reason());
        }

        if self.is_decode() {
            return CohortSyncError::Serialization(self.to_string());
        }

        CohortSyncError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_domain())
    }
}

/// Map a non-success HTTP status to the domain error taxonomy.
pub(crate) fn status_to_error(code: u16, reason: Option<&str>) -> CohortSyncError {
    let message = format!("HTTP {} {}", code, reason.unwrap_or("unknown status"));
    match code {
        401 | 403 => CohortSyncError::Auth(message),
        404 => CohortSyncError::NotFound(message),
        429 => CohortSyncError::Network(message),
        400..=499 => CohortSyncError::InvalidInput(message),
        _ => CohortSyncError::Network(message),
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
