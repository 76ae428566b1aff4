//! Market-data provider abstraction

use async_trait::async_trait;
use indexmap::IndexSet;

use crate::{ForecastResult, Lookback, PriceSeries, StockMetadata, Symbol};

/// Upstream source of price history, metadata and symbol lists.
///
/// Implementations are expected to rate-limit their own outbound traffic.
/// Failures are reported as [`crate::ForecastError::Fetch`] for per-symbol
/// calls and [`crate::ForecastError::Provider`] for universe refreshes.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Daily history for `symbol` covering `lookback`, oldest bar first
    async fn fetch_history(&self, symbol: &Symbol, lookback: Lookback)
        -> ForecastResult<PriceSeries>;

    async fn fetch_metadata(&self, symbol: &Symbol) -> ForecastResult<StockMetadata>;

    /// Fixed priority list, padded from the static universe up to `limit`
    fn list_popular(&self, limit: usize) -> Vec<Symbol>;

    /// Merge every configured symbol list into one deduplicated universe
    async fn refresh_symbol_universe(&self) -> ForecastResult<IndexSet<Symbol>>;
}
