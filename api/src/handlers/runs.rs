use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Serialize;

use common::models::TriggerSource;

use super::ErrorResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct RunAccepted {
    pub config_name: String,
    pub status: &'static str,
}

/// Trigger a monitoring run outside the daily schedule.
///
/// The run executes in the background; the handler only answers whether it
/// was started. A run already holding the lease yields 409 instead of
/// queueing a second one.
#[tracing::instrument(skip(state))]
pub async fn trigger_run(
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

    if let Err(e) = config.validate() {
        return ErrorResponse::new("validation_error", e.to_string()).into_response();
    }

    match state.leases.is_held(&config.name).await {
        Ok(true) => {
            return ErrorResponse::new(
                "conflict",
                format!("A run for '{}' is already in progress", config.name),
            )
            .into_response();
        }
        Ok(false) => {}
        Err(e) => {
            tracing::error!(error = %e, "Lease backend unavailable");
            return ErrorResponse::new("service_unavailable", "Lease backend unavailable")
                .into_response();
        }
    }

    let coordinator = state.coordinator.clone();
    let config_name = config.name.clone();
    tokio::spawn(async move {
        match coordinator.run(&config, TriggerSource::Manual).await {
            Ok(outcome) => {
                tracing::info!(
                    config_name = %outcome.config_name,
                    phase = %outcome.phase,
                    "Manual run finished"
                );
            }
            Err(e) => {
                tracing::error!(config_name = %config.name, error = %e, "Manual run failed");
            }
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(RunAccepted {
            config_name,
            status: "started",
        }),
    )
        .into_response()
}
