//! Forecast endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use forecast_core::{ForecastBundle, Symbol};
use forecast_services::CacheEntryInfo;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

use super::{error_response, status_for};
use crate::AppState;

/// Query parameters for a single forecast
#[derive(Debug, Deserialize)]
pub struct ForecastQuery {
    /// Maximum acceptable age of a cached forecast, in hours
    pub max_age_hours: Option<u64>,
}

#[derive(Debug, Serialize)]
struct ForecastResponse<'a> {
    #[serde(flatten)]
    bundle: &'a ForecastBundle,
    last_price: Option<Decimal>,
    age_secs: u64,
}

#[derive(Debug, Serialize)]
struct CachedForecastsResponse {
    forecasts: Vec<CacheEntryInfo>,
    count: usize,
}

/// Create forecast routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/forecasts", get(list_forecasts))
        .route("/forecasts/{symbol}", get(get_forecast))
}

/// Cached symbols and their ages
async fn list_forecasts(State(state): State<AppState>) -> Json<CachedForecastsResponse> {
    let forecasts = state.reader.cache().entries();
    Json(CachedForecastsResponse {
        count: forecasts.len(),
        forecasts,
    })
}

/// Cached forecast if fresh enough, otherwise computed now
async fn get_forecast(
    State(state): State<AppState>,
    Path(raw_symbol): Path<String>,
    Query(params): Query<ForecastQuery>,
) -> impl IntoResponse {
    let symbol = Symbol::new(&raw_symbol);
    if symbol.as_str().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "symbol must not be empty");
    }

    let freshness = params
        .max_age_hours
        .map(|h| Duration::from_secs(h.saturating_mul(3600)))
        .unwrap_or(state.read_freshness);
    info!("Getting forecast for {} (max age {:?})", symbol, freshness);

    match state.reader.resolve(&symbol, freshness).await {
        Ok(bundle) => {
            let age_secs = state.reader.cache().age_of(&bundle).as_secs();
            let response = ForecastResponse {
                bundle: &bundle,
                last_price: bundle.last_price(),
                age_secs,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            let known = state.registry.current().contains(&symbol);
            let status = status_for(&e, known);
            error!("Failed to resolve forecast for {}: {}", symbol, e);
            error_response(status, e.to_string())
        }
    }
}
