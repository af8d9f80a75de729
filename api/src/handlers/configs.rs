use axum::extract::{Path, State};
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use serde::Serialize;

use common::db::repositories::{JobStatusCounts, TenderSourceStats};

use super::{ErrorResponse, SuccessResponse};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ConfigSummary {
    pub name: String,
    pub sources: Vec<String>,
    pub keywords: Vec<String>,
    pub recipients: Vec<String>,
    pub active: bool,
    pub send_empty_reports: bool,
}

#[derive(Debug, Serialize)]
pub struct ConfigStats {
    pub config_name: String,
    pub active: bool,
    pub jobs: JobStatusCounts,
    pub tenders: Vec<TenderSourceStats>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_notification_at: Option<DateTime<Utc>>,
}

/// List all monitoring configs
#[tracing::instrument(skip(state))]
pub async fn list_configs(State(state): State<AppState>) -> impl IntoResponse {
    match state.configs.list_all().await {
        Ok(configs) => {
            let summaries: Vec<ConfigSummary> = configs
                .into_iter()
                .map(|c| ConfigSummary {
                    name: c.name,
                    sources: c.sources,
                    keywords: c.keywords,
                    recipients: c.recipients,
                    active: c.active,
                    send_empty_reports: c.send_empty_reports,
                })
                .collect();
            SuccessResponse::new(summaries).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to list configs");
            ErrorResponse::new("internal_error", "Failed to list configs").into_response()
        }
    }
}

/// Job and notification statistics for one config
#[tracing::instrument(skip(state))]
pub async fn config_stats(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    let config = match state.configs.find_by_name(&name).await {
        Ok(Some(config)) => config,
        Ok(None) => {
            return ErrorResponse::new("not_found", format!("No config named '{}'", name))
                .into_response();
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to load config");
            return ErrorResponse::new("internal_error", "Failed to load config").into_response();
        }
    };

    let jobs = match state.jobs.status_counts(&name).await {
        Ok(counts) => counts,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load job counts");
            return ErrorResponse::new("internal_error", "Failed to load job counts")
                .into_response();
        }
    };

    let tenders = match state.tenders.stats_for_sources(&config.sources).await {
        Ok(stats) => stats,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load tender stats");
            return ErrorResponse::new("internal_error", "Failed to load tender stats")
                .into_response();
        }
    };

    let last_run_at = state.jobs.last_run_at(&name).await.unwrap_or_default();
    let last_notification_at = state
        .notifications
        .last_sent_at(&name)
        .await
        .unwrap_or_default();

    SuccessResponse::new(ConfigStats {
        config_name: config.name,
        active: config.active,
        jobs,
        tenders,
        last_run_at,
        last_notification_at,
    })
    .into_response()
}
