//! Health snapshot for the serving layer

use chrono::{DateTime, Utc};
use forecast_core::{ModelId, Symbol};
use serde::Serialize;

use crate::scheduler::RefreshScheduler;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// No cache pass has completed yet
    Starting,
    /// Running, but the registry or the cache is empty
    Degraded,
    Healthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceHealth {
    pub status: HealthStatus,
    pub last_registry_refresh: Option<DateTime<Utc>>,
    pub last_cache_refresh: Option<DateTime<Utc>>,
    pub cached_symbols: Vec<Symbol>,
    pub cache_population: usize,
    pub total_available_symbols: usize,
    pub models: Vec<ModelId>,
    pub meta_combiner: bool,
}

impl ServiceHealth {
    pub fn collect(scheduler: &RefreshScheduler) -> Self {
        let marks = scheduler.watermarks();
        let cached_symbols: Vec<Symbol> = scheduler.cache().keys().into_iter().collect();
        let total_available_symbols = scheduler.registry().current().len();
        let combiner = scheduler.pipeline().combiner();

        let status = if marks.last_cache_refresh.is_none() {
            HealthStatus::Starting
        } else if cached_symbols.is_empty() || total_available_symbols == 0 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        Self {
            status,
            last_registry_refresh: marks.last_registry_refresh,
            last_cache_refresh: marks.last_cache_refresh,
            cache_population: cached_symbols.len(),
            cached_symbols,
            total_available_symbols,
            models: combiner.model_ids(),
            meta_combiner: combiner.has_meta_combiner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{ForecastPipeline, PipelineConfig};
    use crate::prediction_cache::PredictionCache;
    use crate::registry::{RegistryConfig, SymbolRegistry};
    use crate::scheduler::SchedulerConfig;
    use crate::test_support::{start_time, symbols, FixedForecaster, StubProvider};
    use crate::ManualClock;
    use forecast_models::EnsembleCombiner;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_health_reports_progress() {
        let provider = Arc::new(StubProvider::new(&["B", "A"]));
        let clock = Arc::new(ManualClock::new(start_time()));
        let combiner = EnsembleCombiner::new(
            vec![
                FixedForecaster::new("a", dec!(0)),
                FixedForecaster::new("b", dec!(1)),
            ],
            None,
        )
        .unwrap();
        let scheduler = RefreshScheduler::new(
            Arc::new(SymbolRegistry::new(
                provider.clone(),
                None,
                clock.clone(),
                RegistryConfig::default(),
            )),
            Arc::new(PredictionCache::new(clock.clone())),
            Arc::new(ForecastPipeline::new(
                provider,
                Arc::new(combiner),
                clock.clone(),
                PipelineConfig::default(),
            )),
            clock,
            SchedulerConfig::default(),
        );

        let before = ServiceHealth::collect(&scheduler);
        assert_eq!(before.status, HealthStatus::Starting);
        assert_eq!(before.cache_population, 0);
        assert_eq!(before.models.len(), 2);
        assert!(!before.meta_combiner);

        scheduler.tick().await;
        let after = ServiceHealth::collect(&scheduler);
        assert_eq!(after.status, HealthStatus::Healthy);
        assert_eq!(after.cached_symbols, symbols(&["A", "B"]));
        assert_eq!(after.total_available_symbols, 2);
        assert_eq!(after.last_cache_refresh, Some(start_time()));
    }
}
