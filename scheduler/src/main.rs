// Scheduler binary entry point

use common::audit::AuditLog;
use common::config::Settings;
use common::coordinator::{CoordinatorConfig, RunCoordinator};
use common::db::repositories::{
    ConfigRepository, JobRepository, NotificationRepository, TenderRepository,
};
use common::db::{DbPool, RedisPool};
use common::dedup::DedupFilter;
use common::lease::{LeaseRegistry, RedisLeaseRegistry};
use common::mailer::SmtpMailer;
use common::retention::RetentionSweeper;
use common::schedule::DailySchedule;
use common::scheduler::{ScanEngine, Scheduler};
use common::scraper::HttpScraperClient;
use common::telemetry;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = Settings::load()?;
    settings.validate().map_err(|e| {
        format!("Invalid configuration: {}", e)
    })?;

    telemetry::init_logging(&settings.observability)?;
    telemetry::init_metrics(settings.observability.metrics_port)?;

    info!("Starting tenderwatch scheduler");
    info!(
        scraper_base_url = %settings.scraper.base_url,
        scan_hour = settings.scan.hour,
        scan_timezone = %settings.scan.timezone,
        "Configuration loaded"
    );

    let db_pool = DbPool::new(&settings.database).await.map_err(|e| {
        error!(error = %e, "Failed to initialize database pool");
        e
    })?;
    db_pool.migrate().await?;

    let redis_pool = RedisPool::new(&settings.redis).await.map_err(|e| {
        error!(error = %e, "Failed to initialize Redis pool");
        e
    })?;

    let config_repo = ConfigRepository::new(db_pool.clone());
    let tenders = Arc::new(TenderRepository::new(db_pool.clone()));
    let jobs = Arc::new(JobRepository::new(db_pool.clone()));
    let notifications = Arc::new(NotificationRepository::new(db_pool.clone()));

    let scraper = Arc::new(HttpScraperClient::new(&settings.scraper)?);
    let mailer = Arc::new(SmtpMailer::new(&settings.email)?);
    let leases: Arc<dyn LeaseRegistry> = Arc::new(RedisLeaseRegistry::new(redis_pool));
    let audit = AuditLog::new(notifications.clone());

    let coordinator = Arc::new(RunCoordinator::new(
        scraper,
        tenders.clone(),
        jobs.clone(),
        leases,
        mailer,
        audit,
        DedupFilter::new(settings.dedup.clone()),
        CoordinatorConfig::from_settings(&settings),
    ));

    let retention = RetentionSweeper::new(
        tenders,
        jobs,
        notifications,
        settings.retention.clone(),
    );

    let engine = Arc::new(ScanEngine::new(
        config_repo,
        coordinator,
        retention,
        DailySchedule::scan(&settings.scan)?,
        DailySchedule::maintenance(&settings.scan)?,
    ));
    info!("Scan engine created");

    let engine_for_shutdown = engine.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received, stopping scan engine");
        if let Err(e) = engine_for_shutdown.stop().await {
            error!(error = %e, "Error during scan engine shutdown");
        }
    });

    if let Err(e) = engine.start().await {
        error!(error = %e, "Scan engine error");
        return Err(e);
    }

    db_pool.close().await;
    info!("Scheduler stopped");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            error!("Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
