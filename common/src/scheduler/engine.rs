// Scan engine: fires scheduled monitoring runs and the maintenance sweep

use crate::coordinator::RunCoordinator;
use crate::db::repositories::ConfigRepository;
use crate::models::TriggerSource;
use crate::retention::RetentionSweeper;
use crate::schedule::DailySchedule;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

/// Scheduler interface: a long-running trigger loop plus a one-shot scan
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Run the trigger loop until a shutdown signal arrives
    async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Stop the trigger loop gracefully
    async fn stop(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Scan all active configs once; returns the number of runs started
    async fn scan_once(
        &self,
        trigger: TriggerSource,
    ) -> Result<usize, Box<dyn std::error::Error + Send + Sync>>;
}

/// Drives the daily scan and the nightly maintenance sweep
pub struct ScanEngine {
    configs: ConfigRepository,
    coordinator: Arc<RunCoordinator>,
    retention: RetentionSweeper,
    scan_schedule: DailySchedule,
    maintenance_schedule: DailySchedule,
    shutdown_tx: tokio::sync::broadcast::Sender<()>,
}

fn duration_until(target: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (target - now).to_std().unwrap_or(Duration::ZERO)
}

impl ScanEngine {
    pub fn new(
        configs: ConfigRepository,
        coordinator: Arc<RunCoordinator>,
        retention: RetentionSweeper,
        scan_schedule: DailySchedule,
        maintenance_schedule: DailySchedule,
    ) -> Self {
        let (shutdown_tx, _shutdown_rx) = tokio::sync::broadcast::channel(1);

        Self {
            configs,
            coordinator,
            retention,
            scan_schedule,
            maintenance_schedule,
            shutdown_tx,
        }
    }

    /// Get a shutdown signal receiver
    pub fn shutdown_receiver(&self) -> tokio::sync::broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    async fn run_maintenance(&self) {
        match self.retention.sweep().await {
            Ok(summary) => {
                debug!(
                    tenders_deleted = summary.tenders_deleted,
                    jobs_deleted = summary.jobs_deleted,
                    notifications_deleted = summary.notifications_deleted,
                    "Maintenance sweep done"
                );
            }
            Err(e) => {
                error!(error = %e, "Maintenance sweep failed");
            }
        }
    }
}

#[async_trait]
impl Scheduler for ScanEngine {
    #[instrument(skip(self))]
    async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!(
            scan_schedule = %self.scan_schedule.expression(),
            maintenance_schedule = %self.maintenance_schedule.expression(),
            timezone = %self.scan_schedule.timezone(),
            "Starting scan engine"
        );

        let mut shutdown_rx = self.shutdown_receiver();

        loop {
            let now = Utc::now();
            let next_scan = self.scan_schedule.next_occurrence(now)?;
            let next_maintenance = self.maintenance_schedule.next_occurrence(now)?;
            debug!(
                next_scan = %next_scan,
                next_maintenance = %next_maintenance,
                "Waiting for next trigger"
            );

            tokio::select! {
                _ = sleep(duration_until(next_scan, now)) => {
                    info!(fired_at = %next_scan, "Daily scan trigger fired");
                    match self.scan_once(TriggerSource::Scheduled).await {
                        Ok(count) => info!(runs = count, "Scheduled scan finished"),
                        Err(e) => error!(error = %e, "Scheduled scan failed"),
                    }
                }
                _ = sleep(duration_until(next_maintenance, now)) => {
                    info!(fired_at = %next_maintenance, "Maintenance trigger fired");
                    self.run_maintenance().await;
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping scan engine");
                    break;
                }
            }
        }

        info!("Scan engine stopped");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn stop(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!("Stopping scan engine");
        let _ = self.shutdown_tx.send(());

        // Give in-flight runs a moment to settle
        sleep(Duration::from_secs(2)).await;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn scan_once(
        &self,
        trigger: TriggerSource,
    ) -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
        let configs = self.configs.find_active().await?;
        info!(configs = configs.len(), trigger = %trigger, "Scanning active configs");

        // Runs for different configs are independent: each holds its own
        // lease and writes its own rows, so they execute concurrently.
        let mut runs = tokio::task::JoinSet::new();
        for config in configs {
            if let Err(e) = config.validate() {
                warn!(config_name = %config.name, error = %e, "Skipping invalid config");
                continue;
            }

            let coordinator = self.coordinator.clone();
            runs.spawn(async move {
                let name = config.name.clone();
                (name, coordinator.run(&config, trigger).await)
            });
        }

        let mut started = 0;
        while let Some(joined) = runs.join_next().await {
            match joined {
                Ok((name, Ok(outcome))) => {
                    started += 1;
                    debug!(
                        config_name = %name,
                        phase = %outcome.phase,
                        tenders_stored = outcome.tenders_stored,
                        "Run finished"
                    );
                }
                Ok((name, Err(e))) => {
                    // One broken config must not starve the rest of the scan
                    error!(config_name = %name, error = %e, "Run failed");
                }
                Err(e) => {
                    error!(error = %e, "Run task panicked");
                }
            }
        }

        Ok(started)
    }
}
