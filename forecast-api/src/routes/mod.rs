//! API route definitions

mod forecasts;
mod health;
mod symbols;

use axum::{http::StatusCode, response::IntoResponse, Json, Router};
use forecast_core::ForecastError;
use serde::Serialize;

use crate::AppState;

/// Create all API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(forecasts::routes())
        .merge(symbols::routes())
        .merge(health::routes())
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub(crate) fn error_response(status: StatusCode, error: impl Into<String>) -> axum::response::Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

/// Status for a failed forecast read. A fetch failure for a symbol the
/// registry does not know is reported as missing data; any other upstream
/// failure is a bad gateway.
pub(crate) fn status_for(err: &ForecastError, known_symbol: bool) -> StatusCode {
    match err {
        ForecastError::Fetch { .. } if !known_symbol => StatusCode::NOT_FOUND,
        ForecastError::Preprocess(_) if !known_symbol => StatusCode::NOT_FOUND,
        e if e.is_upstream() => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
