//! Symbol registry: the popular/all partition the scheduler and the API
//! read from
//!
//! The current set is replaced wholesale on refresh. A failed refresh keeps
//! whatever was loaded before.

use chrono::{DateTime, Utc};
use forecast_core::{ForecastError, ForecastResult, MarketDataProvider, Symbol, SymbolSet};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::clock::{self, Clock};
use crate::store::ForecastStore;

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Size of the popular subset requested from the provider
    pub popular_limit: usize,
    /// Persisted snapshots older than this are not reused
    pub snapshot_max_age: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            popular_limit: 30,
            snapshot_max_age: Duration::from_secs(24 * 60 * 60),
        }
    }
}

pub struct SymbolRegistry {
    provider: Arc<dyn MarketDataProvider>,
    store: Option<Arc<ForecastStore>>,
    clock: Arc<dyn Clock>,
    config: RegistryConfig,
    current: RwLock<Arc<SymbolSet>>,
    refreshed_at: RwLock<Option<DateTime<Utc>>>,
}

impl SymbolRegistry {
    /// Empty registry; nothing is fetched until `refresh`
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        store: Option<Arc<ForecastStore>>,
        clock: Arc<dyn Clock>,
        config: RegistryConfig,
    ) -> Self {
        Self {
            provider,
            store,
            clock,
            config,
            current: RwLock::new(Arc::new(SymbolSet::default())),
            refreshed_at: RwLock::new(None),
        }
    }

    /// Startup load: reuse a recent persisted snapshot, otherwise refresh
    /// from upstream. Never fails; an unreachable provider with no snapshot
    /// leaves the registry empty until the scheduler's next refresh.
    pub async fn load(
        provider: Arc<dyn MarketDataProvider>,
        store: Option<Arc<ForecastStore>>,
        clock: Arc<dyn Clock>,
        config: RegistryConfig,
    ) -> Self {
        let registry = Self::new(provider, store, clock, config);

        if let Some((set, at)) = registry.recent_snapshot() {
            info!(
                symbols = set.len(),
                snapshot_at = %at,
                "Reusing persisted symbol snapshot"
            );
            registry.install(set, at);
        } else if let Err(e) = registry.refresh().await {
            warn!("Initial symbol refresh failed, registry is empty: {}", e);
        }

        registry
    }

    /// Rebuild the symbol set from the provider and persist it.
    ///
    /// When upstream fails, a persisted snapshot within its max age is
    /// accepted in place of fresh data; without one the previous set is kept
    /// and a `Provider` error is returned.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> ForecastResult<Arc<SymbolSet>> {
        match self.provider.refresh_symbol_universe().await {
            Ok(universe) => {
                let popular = self.provider.list_popular(self.config.popular_limit);
                let set = SymbolSet::new(popular, universe);
                let now = self.clock.now();

                if let Some(store) = &self.store {
                    if let Err(e) = store.save_symbol_set(&set, now) {
                        warn!("Failed to persist symbol snapshot: {}", e);
                    }
                }

                info!(
                    symbols = set.len(),
                    popular = set.popular().len(),
                    "Symbol registry refreshed"
                );
                Ok(self.install(set, now))
            }
            Err(e) => {
                warn!("Symbol universe refresh failed: {}", e);
                match self.recent_snapshot() {
                    Some((set, at)) => {
                        if self.current().is_empty() {
                            self.install(set, at);
                        }
                        info!(snapshot_at = %at, "Keeping persisted symbol snapshot");
                        Ok(self.current())
                    }
                    None => Err(match e {
                        ForecastError::Provider(_) => e,
                        other => ForecastError::provider(other.to_string()),
                    }),
                }
            }
        }
    }

    pub fn current(&self) -> Arc<SymbolSet> {
        Arc::clone(&self.current.read())
    }

    /// When the current set was built (or persisted, if loaded from a
    /// snapshot). `None` while nothing is loaded.
    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        *self.refreshed_at.read()
    }

    /// Symbols the scheduler keeps warm. Falls back to the provider's fixed
    /// popular list while the registry is empty.
    pub fn priority(&self, limit: usize) -> Vec<Symbol> {
        let current = self.current();
        if current.is_empty() {
            return self.provider.list_popular(limit);
        }
        current.priority(limit)
    }

    fn install(&self, set: SymbolSet, at: DateTime<Utc>) -> Arc<SymbolSet> {
        let set = Arc::new(set);
        *self.current.write() = Arc::clone(&set);
        *self.refreshed_at.write() = Some(at);
        set
    }

    fn recent_snapshot(&self) -> Option<(SymbolSet, DateTime<Utc>)> {
        let store = self.store.as_ref()?;
        match store.load_symbol_set() {
            Ok(Some((set, at)))
                if !set.is_empty()
                    && clock::age(self.clock.now(), at) < self.config.snapshot_max_age =>
            {
                Some((set, at))
            }
            Ok(_) => None,
            Err(e) => {
                warn!("Failed to read symbol snapshot: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{start_time, symbols, StubProvider};
    use crate::ManualClock;
    use std::sync::atomic::Ordering;

    fn registry(
        provider: Arc<StubProvider>,
        store: Option<Arc<ForecastStore>>,
        clock: Arc<ManualClock>,
    ) -> SymbolRegistry {
        SymbolRegistry::new(provider, store, clock, RegistryConfig::default())
    }

    #[tokio::test]
    async fn test_refresh_builds_partition() {
        let provider = Arc::new(StubProvider::new(&["RELIANCE.NS", "AAPL"]).with_universe(&["MSFT", "AAPL"]));
        let clock = Arc::new(ManualClock::new(start_time()));
        let registry = registry(provider, None, clock);

        let set = registry.refresh().await.unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(registry.priority(2), symbols(&["RELIANCE.NS", "AAPL"]));
        assert_eq!(registry.refreshed_at(), Some(start_time()));
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_set() {
        let provider = Arc::new(StubProvider::new(&["AAPL", "MSFT"]));
        let clock = Arc::new(ManualClock::new(start_time()));
        let registry = registry(provider.clone(), None, clock.clone());

        let before = registry.refresh().await.unwrap();
        provider.break_universe();
        clock.advance(Duration::from_secs(25 * 3600));

        let err = registry.refresh().await.unwrap_err();
        assert!(matches!(err, ForecastError::Provider(_)));
        assert!(Arc::ptr_eq(&before, &registry.current()));
        assert_eq!(registry.refreshed_at(), Some(start_time()));
    }

    #[tokio::test]
    async fn test_failed_refresh_accepts_recent_snapshot() {
        let store = Arc::new(ForecastStore::new_in_memory().unwrap());
        let clock = Arc::new(ManualClock::new(start_time()));
        store
            .save_symbol_set(&SymbolSet::new(symbols(&["TCS.NS"]), vec![]), start_time())
            .unwrap();

        let provider = Arc::new(StubProvider::new(&["AAPL"]));
        provider.break_universe();
        clock.advance(Duration::from_secs(3600));
        let registry = registry(provider, Some(store), clock);

        let set = registry.refresh().await.unwrap();
        assert!(set.contains(&Symbol::new("TCS.NS")));
    }

    #[tokio::test]
    async fn test_load_reuses_fresh_snapshot() {
        let store = Arc::new(ForecastStore::new_in_memory().unwrap());
        let clock = Arc::new(ManualClock::new(start_time()));
        store
            .save_symbol_set(&SymbolSet::new(symbols(&["TCS.NS"]), vec![]), start_time())
            .unwrap();
        clock.advance(Duration::from_secs(23 * 3600));

        let provider = Arc::new(StubProvider::new(&["AAPL"]));
        let registry = SymbolRegistry::load(
            provider.clone(),
            Some(store),
            clock,
            RegistryConfig::default(),
        )
        .await;

        assert_eq!(provider.universe_calls.load(Ordering::SeqCst), 0);
        assert_eq!(registry.priority(30), symbols(&["TCS.NS"]));
        assert_eq!(registry.refreshed_at(), Some(start_time()));
    }

    #[tokio::test]
    async fn test_load_refreshes_stale_snapshot() {
        let store = Arc::new(ForecastStore::new_in_memory().unwrap());
        let clock = Arc::new(ManualClock::new(start_time()));
        store
            .save_symbol_set(&SymbolSet::new(symbols(&["TCS.NS"]), vec![]), start_time())
            .unwrap();
        clock.advance(Duration::from_secs(25 * 3600));

        let provider = Arc::new(StubProvider::new(&["AAPL"]));
        let registry = SymbolRegistry::load(
            provider.clone(),
            Some(store.clone()),
            clock.clone(),
            RegistryConfig::default(),
        )
        .await;

        assert_eq!(provider.universe_calls.load(Ordering::SeqCst), 1);
        assert_eq!(registry.priority(30), symbols(&["AAPL"]));
        let (persisted, at) = store.load_symbol_set().unwrap().unwrap();
        assert!(persisted.contains(&Symbol::new("AAPL")));
        assert_eq!(at, clock.now());
    }

    #[tokio::test]
    async fn test_priority_falls_back_to_provider_list() {
        let provider = Arc::new(StubProvider::new(&["AAPL", "MSFT", "NVDA"]));
        provider.break_universe();
        let clock = Arc::new(ManualClock::new(start_time()));
        let registry = SymbolRegistry::load(provider, None, clock, RegistryConfig::default()).await;

        assert!(registry.current().is_empty());
        assert_eq!(registry.priority(2), symbols(&["AAPL", "MSFT"]));
    }
}
