//! Background refresh of the symbol registry and the prediction cache
//!
//! One tick checks both obligations against their watermarks, then the
//! loop sleeps for the tick interval. Cancellation is observed between
//! ticks only; a pass that has started runs to completion.

use chrono::{DateTime, Utc};
use forecast_core::Symbol;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::{self, Clock};
use crate::pipeline::ForecastPipeline;
use crate::prediction_cache::PredictionCache;
use crate::registry::SymbolRegistry;

/// Configuration for the refresh scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub registry_interval: Duration,
    pub cache_interval: Duration,
    pub tick_interval: Duration,
    /// Pause between consecutive symbols within a cache pass
    pub symbol_delay: Duration,
    /// Number of priority symbols refreshed per pass
    pub popular_limit: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            registry_interval: Duration::from_secs(24 * 60 * 60),
            cache_interval: Duration::from_secs(12 * 60 * 60),
            tick_interval: Duration::from_secs(60 * 60),
            symbol_delay: Duration::from_secs(2),
            popular_limit: 30,
        }
    }
}

/// Timestamps of the last successful refresh of each obligation.
/// `None` means never, which is always due.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefreshWatermarks {
    pub last_registry_refresh: Option<DateTime<Utc>>,
    pub last_cache_refresh: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RegistryOutcome {
    Refreshed { symbols: usize },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolFailure {
    pub symbol: Symbol,
    pub error: String,
}

/// Result of one cache pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PassReport {
    pub started_at: DateTime<Utc>,
    pub attempted: usize,
    pub refreshed: Vec<Symbol>,
    pub failed: Vec<SymbolFailure>,
}

/// What one tick did; `None` for an obligation that was not due
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TickReport {
    pub started_at: DateTime<Utc>,
    pub registry: Option<RegistryOutcome>,
    pub cache: Option<PassReport>,
}

pub struct RefreshScheduler {
    registry: Arc<SymbolRegistry>,
    cache: Arc<PredictionCache>,
    pipeline: Arc<ForecastPipeline>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
    watermarks: RwLock<RefreshWatermarks>,
    last_report: RwLock<Option<TickReport>>,
}

impl RefreshScheduler {
    pub fn new(
        registry: Arc<SymbolRegistry>,
        cache: Arc<PredictionCache>,
        pipeline: Arc<ForecastPipeline>,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            registry,
            cache,
            pipeline,
            clock,
            config,
            watermarks: RwLock::new(RefreshWatermarks::default()),
            last_report: RwLock::new(None),
        }
    }

    /// Start from known watermarks instead of "never"
    pub fn with_watermarks(self, watermarks: RefreshWatermarks) -> Self {
        *self.watermarks.write() = watermarks;
        self
    }

    pub fn watermarks(&self) -> RefreshWatermarks {
        *self.watermarks.read()
    }

    pub fn last_report(&self) -> Option<TickReport> {
        self.last_report.read().clone()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<SymbolRegistry> {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<PredictionCache> {
        &self.cache
    }

    pub fn pipeline(&self) -> &Arc<ForecastPipeline> {
        &self.pipeline
    }

    /// Run each due obligation once: registry first, then the cache pass
    pub async fn tick(&self) -> TickReport {
        let marks = self.watermarks();
        let mut report = TickReport {
            started_at: self.clock.now(),
            ..TickReport::default()
        };

        if is_due(self.clock.now(), marks.last_registry_refresh, self.config.registry_interval) {
            report.registry = Some(match self.registry.refresh().await {
                Ok(set) => {
                    self.watermarks.write().last_registry_refresh = Some(self.clock.now());
                    RegistryOutcome::Refreshed { symbols: set.len() }
                }
                Err(e) => {
                    warn!("Scheduled symbol refresh failed: {}", e);
                    RegistryOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            });
        }

        let now = self.clock.now();
        if is_due(now, marks.last_cache_refresh, self.config.cache_interval) {
            report.cache = Some(self.refresh_cache(now).await);
        }

        *self.last_report.write() = Some(report.clone());
        report
    }

    /// Recompute every priority symbol. The cache watermark becomes the
    /// pass start time whatever the per-symbol outcomes.
    async fn refresh_cache(&self, started_at: DateTime<Utc>) -> PassReport {
        let symbols = self.registry.priority(self.config.popular_limit);
        info!("Refreshing forecasts for {} symbols", symbols.len());

        let mut pass = PassReport {
            started_at,
            ..PassReport::default()
        };
        for (i, symbol) in symbols.into_iter().enumerate() {
            if i > 0 {
                self.clock.sleep(self.config.symbol_delay).await;
            }
            pass.attempted += 1;

            match self.pipeline.compute(&symbol).await {
                Ok(bundle) => {
                    self.cache.put(symbol.clone(), bundle);
                    pass.refreshed.push(symbol);
                }
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "Forecast refresh failed");
                    pass.failed.push(SymbolFailure {
                        symbol,
                        error: e.to_string(),
                    });
                }
            }
        }

        self.watermarks.write().last_cache_refresh = Some(started_at);
        info!(
            attempted = pass.attempted,
            refreshed = pass.refreshed.len(),
            failed = pass.failed.len(),
            "Cache refresh pass complete"
        );
        pass
    }

    /// Tick forever, sleeping `tick_interval` in between, until `cancel`
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        info!(
            "Starting refresh scheduler with {:?} tick interval",
            self.config.tick_interval
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let report = self.tick().await;
            debug!(
                registry = ?report.registry,
                cache_attempted = report.cache.as_ref().map(|p| p.attempted),
                "Scheduler tick complete"
            );

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.clock.sleep(self.config.tick_interval) => {}
            }
        }

        info!("Refresh scheduler stopped");
    }

    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}

/// Strictly more than `interval` since `last`; never-run is always due
fn is_due(now: DateTime<Utc>, last: Option<DateTime<Utc>>, interval: Duration) -> bool {
    match last {
        Some(at) => clock::age(now, at) > interval,
        None => true,
    }
}
