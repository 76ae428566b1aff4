//! Core types for the forecast cache service
//!
//! This crate defines the shared data structures used across the workspace:
//! symbols and symbol sets, daily price series, prediction points and
//! forecast bundles, plus the market-data provider abstraction the
//! scheduler and read path depend on.

pub mod config;
pub mod error;
pub mod metadata;
pub mod prediction;
pub mod provider;
pub mod series;
pub mod symbol;

pub use config::{ConfigError, ProcessEnv, VarSource};
pub use error::{ForecastError, ForecastResult};
pub use metadata::StockMetadata;
pub use prediction::{
    AgreementLevel, ForecastBundle, ModelAgreement, ModelId, PredictionPoint,
};
pub use provider::MarketDataProvider;
pub use series::{Lookback, PriceBar, PriceSeries};
pub use symbol::{Symbol, SymbolSet};
