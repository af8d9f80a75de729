// Maintenance sweep over aged rows

use crate::config::RetentionConfig;
use crate::db::repositories::{JobStore, NotificationStore, TenderStore};
use crate::errors::DatabaseError;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{info, instrument};

/// What one sweep removed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionSummary {
    pub tenders_deleted: u64,
    pub jobs_deleted: u64,
    pub notifications_deleted: u64,
}

/// Deletes aged rows on the nightly maintenance tick. High-relevance tenders
/// survive their window.
pub struct RetentionSweeper {
    tenders: Arc<dyn TenderStore>,
    jobs: Arc<dyn JobStore>,
    notifications: Arc<dyn NotificationStore>,
    config: RetentionConfig,
}

impl RetentionSweeper {
    pub fn new(
        tenders: Arc<dyn TenderStore>,
        jobs: Arc<dyn JobStore>,
        notifications: Arc<dyn NotificationStore>,
        config: RetentionConfig,
    ) -> Self {
        Self {
            tenders,
            jobs,
            notifications,
            config,
        }
    }

    #[instrument(skip(self))]
    pub async fn sweep(&self) -> Result<RetentionSummary, DatabaseError> {
        let now = Utc::now();

        let tender_cutoff = now - Duration::days(self.config.tender_days);
        let tenders_deleted = self
            .tenders
            .delete_stale(tender_cutoff, self.config.keep_relevance_at_least)
            .await?;

        let job_cutoff = now - Duration::days(self.config.job_days);
        let jobs_deleted = self.jobs.delete_older_than(job_cutoff).await?;

        let notification_cutoff = now - Duration::days(self.config.notification_days);
        let notifications_deleted = self
            .notifications
            .delete_older_than(notification_cutoff)
            .await?;

        let summary = RetentionSummary {
            tenders_deleted,
            jobs_deleted,
            notifications_deleted,
        };

        info!(
            tenders_deleted = summary.tenders_deleted,
            jobs_deleted = summary.jobs_deleted,
            notifications_deleted = summary.notifications_deleted,
            "Retention sweep finished"
        );

        Ok(summary)
    }
}
