use std::sync::Arc;

use common::config::Settings;
use common::coordinator::RunCoordinator;
use common::db::repositories::{
    ConfigRepository, JobRepository, NotificationRepository, TenderRepository,
};
use common::db::{DbPool, RedisPool};
use common::lease::LeaseRegistry;
use common::mailer::Mailer;
use metrics_exporter_prometheus::PrometheusHandle;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub redis_pool: RedisPool,
    pub settings: Arc<Settings>,
    pub configs: ConfigRepository,
    pub jobs: JobRepository,
    pub notifications: NotificationRepository,
    pub tenders: TenderRepository,
    pub coordinator: Arc<RunCoordinator>,
    pub leases: Arc<dyn LeaseRegistry>,
    pub mailer: Arc<dyn Mailer>,
    pub metrics_handle: PrometheusHandle,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db_pool: DbPool,
        redis_pool: RedisPool,
        settings: Settings,
        configs: ConfigRepository,
        jobs: JobRepository,
        notifications: NotificationRepository,
        tenders: TenderRepository,
        coordinator: Arc<RunCoordinator>,
        leases: Arc<dyn LeaseRegistry>,
        mailer: Arc<dyn Mailer>,
        metrics_handle: PrometheusHandle,
    ) -> Self {
        Self {
            db_pool,
            redis_pool,
            settings: Arc::new(settings),
            configs,
            jobs,
            notifications,
            tenders,
            coordinator,
            leases,
            mailer,
            metrics_handle,
        }
    }
}
