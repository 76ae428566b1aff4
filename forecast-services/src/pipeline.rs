//! Per-symbol forecast computation shared by the scheduler and the read path

use forecast_core::{ForecastBundle, ForecastError, ForecastResult, Lookback, MarketDataProvider, Symbol};
use forecast_models::{preprocess, EnsembleCombiner, LinearMetaCombiner};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::clock::Clock;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub lookback: Lookback,
    /// Forecast horizon in business days
    pub horizon: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lookback: Lookback::default(),
            horizon: 30,
        }
    }
}

/// fetch history → preprocess → ensemble → fetch metadata → bundle
pub struct ForecastPipeline {
    provider: Arc<dyn MarketDataProvider>,
    combiner: Arc<EnsembleCombiner>,
    clock: Arc<dyn Clock>,
    config: PipelineConfig,
}

impl ForecastPipeline {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        combiner: Arc<EnsembleCombiner>,
        clock: Arc<dyn Clock>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            provider,
            combiner,
            clock,
            config,
        }
    }

    pub fn combiner(&self) -> &Arc<EnsembleCombiner> {
        &self.combiner
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Build a complete bundle for `symbol`, or fail without side effects
    #[instrument(skip(self, symbol), fields(symbol = %symbol))]
    pub async fn compute(&self, symbol: &Symbol) -> ForecastResult<ForecastBundle> {
        let history = self.provider.fetch_history(symbol, self.config.lookback).await?;
        debug!(bars = history.len(), "History fetched");
        let enriched = preprocess(&history)?;

        // Forecasters are CPU-bound
        let combiner = Arc::clone(&self.combiner);
        let horizon = self.config.horizon;
        let forecast = tokio::task::spawn_blocking(move || combiner.combine(&enriched, horizon))
            .await
            .map_err(|e| ForecastError::model("ensemble", format!("forecast task failed: {}", e)))??;

        let metadata = self.provider.fetch_metadata(symbol).await?;

        Ok(ForecastBundle {
            symbol: symbol.clone(),
            metadata,
            predictions: forecast.points,
            history,
            models: forecast.contributors,
            agreement: forecast.agreement,
            computed_at: self.clock.now(),
        })
    }

    /// Fit a linear meta-combiner on `symbol`'s history
    #[instrument(skip(self, symbol), fields(symbol = %symbol))]
    pub async fn fit_meta(&self, symbol: &Symbol) -> ForecastResult<LinearMetaCombiner> {
        let history = self.provider.fetch_history(symbol, self.config.lookback).await?;
        let enriched = preprocess(&history)?;
        let combiner = Arc::clone(&self.combiner);
        tokio::task::spawn_blocking(move || combiner.fit_meta(&enriched))
            .await
            .map_err(|e| ForecastError::model("meta-combiner", format!("fit task failed: {}", e)))?
    }
}
