//! The forecaster capability the ensemble is built from

use forecast_core::{ForecastResult, ModelId, PredictionPoint};

use crate::EnrichedSeries;

/// Given enriched history and a horizon, produce one dated point per
/// business day after the last history date.
///
/// Implementations are CPU-bound and synchronous; callers run them off the
/// async executor.
pub trait Forecaster: Send + Sync {
    fn id(&self) -> ModelId;

    fn predict(
        &self,
        history: &EnrichedSeries,
        horizon: usize,
    ) -> ForecastResult<Vec<PredictionPoint>>;
}
