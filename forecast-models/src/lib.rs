//! Forecasting models for the forecast cache service
//!
//! Turns a raw [`forecast_core::PriceSeries`] into an indicator-enriched
//! series, runs independent [`Forecaster`]s over it and merges their output
//! into one ensemble forecast with dispersion-based bounds.

pub mod calendar;
pub mod ensemble;
pub mod forecaster;
pub mod meta;
pub mod preprocess;
pub mod recurrent;
pub mod seasonal;
pub mod stats;

pub use ensemble::{Blending, EnsembleCombiner, EnsembleForecast, ModelFailure};
pub use forecaster::Forecaster;
pub use meta::{LinearMetaCombiner, MetaCombiner};
pub use preprocess::{preprocess, EnrichedBar, EnrichedSeries, MIN_ENRICHED_ROWS};
pub use recurrent::AttentionForecaster;
pub use seasonal::SeasonalForecaster;
