//! Health check endpoints

use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use forecast_services::{HealthStatus, ServiceHealth, TickReport};
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    #[serde(flatten)]
    health: ServiceHealth,
    last_tick: Option<TickReport>,
}

/// Health check handler
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let health = ServiceHealth::collect(&state.scheduler);

    let code = match health.status {
        HealthStatus::Degraded => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Starting | HealthStatus::Healthy => StatusCode::OK,
    };

    let response = HealthResponse {
        health,
        last_tick: state.scheduler.last_report(),
    };

    (code, Json(response))
}

/// Simple liveness check (always returns OK if server is running)
async fn liveness() -> &'static str {
    "OK"
}

/// Create health routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/live", get(liveness))
}
