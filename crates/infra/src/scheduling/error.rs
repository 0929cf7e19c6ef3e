//! Scheduler error types

use cohortsync_domain::CohortSyncError;
use thiserror::Error;

use crate::errors::InfraError;

/// Lifecycle and registration failures of a [`super::CronJobScheduler`].
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("job '{job}' is already scheduled")]
    AlreadyRunning { job: &'static str },

    #[error("job '{job}' is not scheduled")]
    NotRunning { job: &'static str },

    /// The underlying cron runtime could not be built.
    #[error("cron runtime unavailable: {0}")]
    CreationFailed(String),

    #[error("cron runtime failed to start: {0}")]
    StartFailed(String),

    #[error("cron runtime failed to stop: {0}")]
    StopFailed(String),

    /// Usually a malformed cron expression.
    #[error("cannot register job '{job}': {reason}")]
    JobRegistrationFailed { job: String, reason: String },

    #[error("scheduler {phase} timed out after {seconds}s")]
    Timeout { phase: &'static str, seconds: u64 },

    #[error("scheduler monitor task failed: {0}")]
    TaskJoinFailed(String),
}

impl From<tokio::task::JoinError> for SchedulerError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskJoinFailed(err.to_string())
    }
}

impl From<SchedulerError> for InfraError {
    fn from(err: SchedulerError) -> Self {
        let message = err.to_string();
        Self(match err {
            SchedulerError::AlreadyRunning { .. } | SchedulerError::NotRunning { .. } => {
                CohortSyncError::InvalidInput(message)
            }
            SchedulerError::JobRegistrationFailed { .. } => CohortSyncError::Config(message),
            SchedulerError::CreationFailed(_)
            | SchedulerError::StartFailed(_)
            | SchedulerError::StopFailed(_)
            | SchedulerError::Timeout { .. }
            | SchedulerError::TaskJoinFailed(_) => CohortSyncError::Internal(message),
        })
    }
}

impl From<SchedulerError> for CohortSyncError {
    fn from(err: SchedulerError) -> Self {
        InfraError::from(err).into()
    }
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_start_is_invalid_input_naming_the_job() {
        let err: CohortSyncError = SchedulerError::AlreadyRunning { job: "genomics-fetch" }.into();
        assert!(matches!(err, CohortSyncError::InvalidInput(message) if message.contains("genomics-fetch")));
    }

    #[test]
    fn bad_cron_is_config_error() {
        let err: CohortSyncError = SchedulerError::JobRegistrationFailed {
            job: "retry-sweep".into(),
            reason: "invalid cron".into(),
        }
        .into();
        assert!(matches!(err, CohortSyncError::Config(message) if message.contains("retry-sweep")));
    }

    #[test]
    fn stop_timeout_is_internal() {
        let err: CohortSyncError = SchedulerError::Timeout { phase: "stop", seconds: 5 }.into();
        assert_eq!(err, CohortSyncError::Internal("scheduler stop timed out after 5s".into()));
    }
}
