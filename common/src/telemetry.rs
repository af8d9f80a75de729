// Logging and metrics initialization

use crate::config::ObservabilityConfig;
use crate::models::{JobStatus, NotificationDecision, RunOutcome};
use anyhow::Result;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber; JSON output for production, pretty for
/// local runs
pub fn init_logging(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    if config.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to init tracing subscriber: {}", e))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to init tracing subscriber: {}", e))?;
    }

    Ok(())
}

/// Install the Prometheus exporter with its own HTTP listener
pub fn init_metrics(metrics_port: u16) -> Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", metrics_port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid metrics port: {}", e))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;

    describe_metrics();

    tracing::info!(
        metrics_port = metrics_port,
        "Prometheus metrics exporter initialized"
    );
    Ok(())
}

/// Install the Prometheus recorder without a listener; the caller serves
/// the rendered text itself
pub fn install_recorder() -> Result<metrics_exporter_prometheus::PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;

    describe_metrics();
    Ok(handle)
}

/// Register metric descriptions with the installed recorder
pub fn describe_metrics() {
    describe_counter!("runs_total", "Monitoring runs by final phase");
    describe_counter!("scraping_jobs_total", "Scraping jobs by terminal status");
    describe_counter!("tenders_stored_total", "Tenders accepted and persisted");
    describe_counter!(
        "candidates_discarded_total",
        "Candidates discarded by the filter, by reason"
    );
    describe_counter!(
        "notifications_total",
        "Notification attempts by decision and outcome"
    );
    describe_histogram!(
        "run_duration_seconds",
        "Wall-clock duration of monitoring runs"
    );
}

/// Record the final counters for one monitoring run
pub fn record_run_outcome(outcome: &RunOutcome) {
    counter!(
        "runs_total",
        "config" => outcome.config_name.clone(),
        "phase" => outcome.phase.to_string(),
        "trigger" => outcome.trigger.to_string()
    )
    .increment(1);

    counter!("tenders_stored_total", "config" => outcome.config_name.clone())
        .increment(outcome.tenders_stored as u64);
    counter!(
        "candidates_discarded_total",
        "config" => outcome.config_name.clone(),
        "reason" => "duplicate"
    )
    .increment(outcome.duplicates_discarded as u64);
    counter!(
        "candidates_discarded_total",
        "config" => outcome.config_name.clone(),
        "reason" => "irrelevant"
    )
    .increment(outcome.irrelevant_discarded as u64);

    if let Some(finished_at) = outcome.finished_at {
        let duration = (finished_at - outcome.started_at).num_milliseconds() as f64 / 1000.0;
        histogram!("run_duration_seconds", "config" => outcome.config_name.clone())
            .record(duration);
    }
}

/// Record one scraping job reaching a terminal status
pub fn record_job_status(config_name: &str, source: &str, status: JobStatus) {
    counter!(
        "scraping_jobs_total",
        "config" => config_name.to_string(),
        "source" => source.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record one notification attempt
pub fn record_notification(config_name: &str, decision: NotificationDecision, success: bool) {
    let decision = match decision {
        NotificationDecision::DetailedReport => "detailed_report",
        NotificationDecision::EmptyReport => "empty_report",
        NotificationDecision::Suppressed => "suppressed",
    };
    counter!(
        "notifications_total",
        "config" => config_name.to_string(),
        "decision" => decision,
        "success" => success.to_string()
    )
    .increment(1);
}
