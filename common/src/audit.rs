// Audit trail for notifications and run outcomes

use crate::db::repositories::NotificationStore;
use crate::models::{NotificationLogEntry, RunOutcome};
use crate::telemetry;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Records what the system decided and whether deliveries happened.
///
/// Notification entries go to the `notification_log` table; run outcomes are
/// structured log events plus metrics. An audit write failure never fails the
/// run that produced it.
#[derive(Clone)]
pub struct AuditLog {
    notifications: Arc<dyn NotificationStore>,
}

impl AuditLog {
    pub fn new(notifications: Arc<dyn NotificationStore>) -> Self {
        Self { notifications }
    }

    /// Append a notification attempt to the audit trail
    #[instrument(skip(self, entry), fields(config_name = %entry.config_name, success = entry.success))]
    pub async fn record_notification(&self, entry: NotificationLogEntry) {
        if let Err(e) = self.notifications.append(&entry).await {
            warn!(
                config_name = %entry.config_name,
                error = %e,
                "Failed to persist notification log entry"
            );
        }
    }

    /// Emit the structured summary of a finished run
    pub fn record_run_outcome(&self, outcome: &RunOutcome) {
        telemetry::record_run_outcome(outcome);

        if let Some(reason) = &outcome.abort_reason {
            error!(
                config_name = %outcome.config_name,
                trigger = %outcome.trigger,
                phase = %outcome.phase,
                reason = %reason,
                "Monitoring run aborted"
            );
            return;
        }

        info!(
            config_name = %outcome.config_name,
            trigger = %outcome.trigger,
            phase = %outcome.phase,
            sources_total = outcome.sources_total,
            jobs_succeeded = outcome.jobs_succeeded,
            jobs_failed = outcome.jobs_failed,
            jobs_timed_out = outcome.jobs_timed_out,
            candidates_seen = outcome.candidates_seen,
            tenders_stored = outcome.tenders_stored,
            duplicates_discarded = outcome.duplicates_discarded,
            irrelevant_discarded = outcome.irrelevant_discarded,
            warnings = outcome.warnings.len(),
            "Monitoring run finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::MockNotificationStore;
    use crate::errors::DatabaseError;

    #[tokio::test]
    async fn test_record_notification_swallows_store_errors() {
        let mut store = MockNotificationStore::new();
        store
            .expect_append()
            .returning(|_| Err(DatabaseError::QueryFailed("down".to_string())));

        let audit = AuditLog::new(Arc::new(store));
        let entry = NotificationLogEntry::sent(
            "it-tenders",
            &["team@example.com".to_string()],
            "1 new opportunity (it-tenders)",
            vec![],
        );

        // Must not panic or propagate
        audit.record_notification(entry).await;
    }
}
