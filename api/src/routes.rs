use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Create the main application router with all routes and middleware
#[tracing::instrument(skip(state))]
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::metrics_handler))
        .route("/api/v1/configs", get(handlers::configs::list_configs))
        .route(
            "/api/v1/configs/:name/stats",
            get(handlers::configs::config_stats),
        )
        .route("/api/v1/configs/:name/run", post(handlers::runs::trigger_run))
        .route(
            "/api/v1/notifications/test",
            post(handlers::notifications::send_test_notification),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
