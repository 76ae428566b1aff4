//! Price-history cache in front of a market-data provider
//!
//! Histories are kept in the store per symbol and range. A stored copy
//! younger than `max_age` is served without an upstream call; an older one
//! is refetched, and kept as the answer when the upstream fetch fails.

use async_trait::async_trait;
use forecast_core::{
    ForecastResult, Lookback, MarketDataProvider, PriceSeries, StockMetadata, Symbol,
};
use indexmap::IndexSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::clock::{self, Clock};
use crate::store::ForecastStore;

pub struct HistoryCache {
    inner: Arc<dyn MarketDataProvider>,
    store: Arc<ForecastStore>,
    clock: Arc<dyn Clock>,
    max_age: Duration,
}

impl HistoryCache {
    pub fn new(
        inner: Arc<dyn MarketDataProvider>,
        store: Arc<ForecastStore>,
        clock: Arc<dyn Clock>,
        max_age: Duration,
    ) -> Self {
        Self {
            inner,
            store,
            clock,
            max_age,
        }
    }

    fn stored(&self, symbol: &Symbol, lookback: Lookback) -> Option<(PriceSeries, Duration)> {
        match self.store.load_history(symbol, lookback) {
            Ok(Some((series, fetched_at))) => {
                Some((series, clock::age(self.clock.now(), fetched_at)))
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to read stored history for {}: {}", symbol, e);
                None
            }
        }
    }
}

#[async_trait]
impl MarketDataProvider for HistoryCache {
    async fn fetch_history(
        &self,
        symbol: &Symbol,
        lookback: Lookback,
    ) -> ForecastResult<PriceSeries> {
        let stored = self.stored(symbol, lookback);
        if let Some((series, age)) = &stored {
            if age < &self.max_age {
                debug!(symbol = %symbol, age_secs = age.as_secs(), "Serving stored history");
                return Ok(series.clone());
            }
        }

        match self.inner.fetch_history(symbol, lookback).await {
            Ok(series) => {
                if let Err(e) = self.store.save_history(&series, lookback, self.clock.now()) {
                    warn!("Failed to store history for {}: {}", symbol, e);
                }
                Ok(series)
            }
            Err(e) => match stored {
                Some((series, age)) => {
                    warn!(
                        symbol = %symbol,
                        age_secs = age.as_secs(),
                        error = %e,
                        "History fetch failed, serving stale copy"
                    );
                    Ok(series)
                }
                None => Err(e),
            },
        }
    }

    async fn fetch_metadata(&self, symbol: &Symbol) -> ForecastResult<StockMetadata> {
        self.inner.fetch_metadata(symbol).await
    }

    fn list_popular(&self, limit: usize) -> Vec<Symbol> {
        self.inner.list_popular(limit)
    }

    async fn refresh_symbol_universe(&self) -> ForecastResult<IndexSet<Symbol>> {
        self.inner.refresh_symbol_universe().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{start_time, StubProvider};
    use crate::ManualClock;
    use forecast_core::ForecastError;
    use std::sync::atomic::Ordering;

    const DAY: Duration = Duration::from_secs(24 * 3600);

    fn cache(provider: Arc<StubProvider>) -> (Arc<ManualClock>, Arc<ForecastStore>, HistoryCache) {
        let clock = Arc::new(ManualClock::new(start_time()));
        let store = Arc::new(ForecastStore::new_in_memory().unwrap());
        let cache = HistoryCache::new(provider, store.clone(), clock.clone(), DAY);
        (clock, store, cache)
    }

    #[tokio::test]
    async fn test_fresh_history_is_reused() {
        let provider = Arc::new(StubProvider::new(&["AAPL"]));
        let (clock, store, cache) = cache(provider.clone());
        let symbol = Symbol::new("AAPL");

        let first = cache.fetch_history(&symbol, Lookback::default()).await.unwrap();
        clock.advance(DAY - Duration::from_secs(60));
        let second = cache.fetch_history(&symbol, Lookback::default()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(provider.history_calls.load(Ordering::SeqCst), 1);
        assert!(store.load_history(&symbol, Lookback::default()).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_expired_history_is_refetched() {
        let provider = Arc::new(StubProvider::new(&["AAPL"]));
        let (clock, store, cache) = cache(provider.clone());
        let symbol = Symbol::new("AAPL");

        cache.fetch_history(&symbol, Lookback::default()).await.unwrap();
        clock.advance(DAY);
        cache.fetch_history(&symbol, Lookback::default()).await.unwrap();

        assert_eq!(provider.history_calls.load(Ordering::SeqCst), 2);
        let (_, fetched_at) = store.load_history(&symbol, Lookback::default()).unwrap().unwrap();
        assert_eq!(fetched_at, clock.now());
    }

    #[tokio::test]
    async fn test_stale_copy_served_when_upstream_fails() {
        let provider = Arc::new(StubProvider::new(&["AAPL"]).failing_history_for("AAPL"));
        let (clock, store, cache) = cache(provider.clone());
        let symbol = Symbol::new("AAPL");
        let stale = crate::test_support::history(&symbol, 120);
        store
            .save_history(&stale, Lookback::default(), start_time())
            .unwrap();

        clock.advance(DAY * 3);
        let served = cache.fetch_history(&symbol, Lookback::default()).await.unwrap();

        assert_eq!(served, stale);
        assert_eq!(provider.history_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_without_stored_copy_propagates() {
        let provider = Arc::new(StubProvider::new(&["AAPL"]).failing_history_for("AAPL"));
        let (_, _, cache) = cache(provider);

        let err = cache
            .fetch_history(&Symbol::new("AAPL"), Lookback::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ForecastError::Fetch { .. }));
    }

    #[tokio::test]
    async fn test_other_calls_pass_through() {
        let provider = Arc::new(StubProvider::new(&["AAPL", "MSFT"]));
        let (_, _, cache) = cache(provider.clone());

        assert_eq!(cache.list_popular(1), vec![Symbol::new("AAPL")]);
        cache.fetch_metadata(&Symbol::new("MSFT")).await.unwrap();
        assert_eq!(cache.refresh_symbol_universe().await.unwrap().len(), 2);
        assert_eq!(provider.upstream_calls(), 2);
    }
}
