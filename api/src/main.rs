// API binary entry point

mod handlers;
mod routes;
mod state;

use std::sync::Arc;

use common::audit::AuditLog;
use common::config::Settings;
use common::coordinator::{CoordinatorConfig, RunCoordinator};
use common::db::repositories::{
    ConfigRepository, JobRepository, NotificationRepository, TenderRepository,
};
use common::db::{DbPool, RedisPool};
use common::dedup::DedupFilter;
use common::lease::{LeaseRegistry, RedisLeaseRegistry};
use common::mailer::{Mailer, SmtpMailer};
use common::scraper::HttpScraperClient;
use common::telemetry;
use tracing::{error, info};

use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = Settings::load()?;
    settings
        .validate()
        .map_err(|e| format!("Invalid configuration: {}", e))?;

    telemetry::init_logging(&settings.observability)?;
    let metrics_handle = telemetry::install_recorder()?;

    info!("Starting tenderwatch API server");

    let db_pool = DbPool::new(&settings.database).await.map_err(|e| {
        error!(error = %e, "Failed to initialize database pool");
        e
    })?;
    db_pool.migrate().await?;

    let redis_pool = RedisPool::new(&settings.redis).await.map_err(|e| {
        error!(error = %e, "Failed to initialize Redis pool");
        e
    })?;

    let configs = ConfigRepository::new(db_pool.clone());
    let jobs = JobRepository::new(db_pool.clone());
    let notifications = NotificationRepository::new(db_pool.clone());
    let tenders = TenderRepository::new(db_pool.clone());

    let scraper = Arc::new(HttpScraperClient::new(&settings.scraper)?);
    let mailer: Arc<dyn Mailer> = Arc::new(SmtpMailer::new(&settings.email)?);
    let leases: Arc<dyn LeaseRegistry> = Arc::new(RedisLeaseRegistry::new(redis_pool.clone()));
    let audit = AuditLog::new(Arc::new(notifications.clone()));

    let coordinator = Arc::new(RunCoordinator::new(
        scraper,
        Arc::new(tenders.clone()),
        Arc::new(jobs.clone()),
        leases.clone(),
        mailer.clone(),
        audit,
        DedupFilter::new(settings.dedup.clone()),
        CoordinatorConfig::from_settings(&settings),
    ));

    let bind_addr = format!("{}:{}", settings.server.host, settings.server.port);
    let state = AppState::new(
        db_pool.clone(),
        redis_pool,
        settings,
        configs,
        jobs,
        notifications,
        tenders,
        coordinator,
        leases,
        mailer,
        metrics_handle,
    );

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(address = %bind_addr, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db_pool.close().await;
    info!("API server stopped");
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
