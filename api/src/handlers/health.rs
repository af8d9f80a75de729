use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub database: &'static str,
    pub redis: &'static str,
}

/// Health check endpoint; degrades to 503 when a backend is unreachable
#[tracing::instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = match state.db_pool.health_check().await {
        Ok(()) => "up",
        Err(_) => "down",
    };
    let redis = match state.redis_pool.health_check().await {
        Ok(()) => "up",
        Err(_) => "down",
    };

    let healthy = database == "up" && redis == "up";
    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        code,
        Json(HealthStatus {
            status: if healthy { "ok" } else { "degraded" },
            database,
            redis,
        }),
    )
}
