//! Account field changes bound for the partner.

use std::sync::Arc;

use cohortsync_domain::{
    AccountUpdateEvent, ChangeType, CohortSyncError, PendingChange, Result, WriteMethod,
};
use tracing::instrument;

use super::service::{SubmitResult, SyncService};

/// Turns account-update events into partner writes.
pub struct AccountChangeProcessor {
    sync: Arc<SyncService>,
}

impl AccountChangeProcessor {
    pub fn new(sync: Arc<SyncService>) -> Self {
        Self { sync }
    }

    /// Submit the changed fields; deferred when the subject has no partner id.
    #[instrument(skip(self, event), fields(subject_id = %event.subject_id, change_type = %event.change_type))]
    pub async fn handle(&self, event: &AccountUpdateEvent) -> Result<SubmitResult> {
        if event.subject_id.trim().is_empty() {
            return Err(CohortSyncError::InvalidInput("account update without subject".into()));
        }
        if event.change_type == ChangeType::OrderTracking {
            return Err(CohortSyncError::InvalidInput(
                "order tracking changes do not come from account updates".into(),
            ));
        }

        let change = PendingChange {
            subject_id: event.subject_id.clone(),
            change_type: event.change_type,
            method: WriteMethod::Put,
            // Resolved from the participant directory at send time.
            target_id: String::new(),
            body: event.fields.clone(),
        };

        self.sync.submit(&change).await
    }
}
