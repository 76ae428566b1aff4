//! Read path: serve a cached forecast or compute one on demand

use forecast_core::{ForecastBundle, ForecastResult, Symbol};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::pipeline::ForecastPipeline;
use crate::prediction_cache::PredictionCache;

pub struct CacheReader {
    cache: Arc<PredictionCache>,
    pipeline: Arc<ForecastPipeline>,
}

impl CacheReader {
    pub fn new(cache: Arc<PredictionCache>, pipeline: Arc<ForecastPipeline>) -> Self {
        Self { cache, pipeline }
    }

    pub fn cache(&self) -> &Arc<PredictionCache> {
        &self.cache
    }

    /// Cached bundle younger than `freshness`, else a newly computed one
    /// that is stored before being returned. Concurrent writers for the same
    /// symbol race; the last `put` wins.
    #[instrument(skip(self, symbol), fields(symbol = %symbol))]
    pub async fn resolve(
        &self,
        symbol: &Symbol,
        freshness: Duration,
    ) -> ForecastResult<Arc<ForecastBundle>> {
        if let Some((bundle, age)) = self.cache.get_with_age(symbol) {
            if age < freshness {
                debug!(age_secs = age.as_secs(), "Serving cached forecast");
                return Ok(bundle);
            }
            debug!(age_secs = age.as_secs(), "Cached forecast is stale");
        }

        let bundle = self.pipeline.compute(symbol).await?;
        info!("Computed forecast on demand");
        Ok(self.cache.put(symbol.clone(), bundle))
    }
}
