//! Services for the forecast cache
//!
//! The prediction cache and its SQLite persistence, a stored price-history
//! layer in front of the market-data provider, the symbol registry, the
//! per-symbol forecast pipeline, the read-path cache reader and the refresh
//! scheduler that keeps the popular symbols warm.

pub mod clock;
pub mod config;
pub mod health;
pub mod history_cache;
pub mod pipeline;
pub mod prediction_cache;
pub mod reader;
pub mod registry;
pub mod scheduler;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ServiceConfig;
pub use health::{HealthStatus, ServiceHealth};
pub use history_cache::HistoryCache;
pub use pipeline::{ForecastPipeline, PipelineConfig};
pub use prediction_cache::{CacheEntryInfo, CacheStats, PredictionCache};
pub use reader::CacheReader;
pub use registry::{RegistryConfig, SymbolRegistry};
pub use scheduler::{
    PassReport, RefreshScheduler, RefreshWatermarks, RegistryOutcome, SchedulerConfig,
    SymbolFailure, TickReport,
};
pub use store::{ForecastStore, StoreError};
