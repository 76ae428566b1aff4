//! In-memory prediction cache with optional SQLite write-through
//!
//! One entry per symbol, each a whole `Arc<ForecastBundle>`. Writers swap
//! the Arc under the write lock, so readers see either the old or the new
//! bundle and never a mix.

use chrono::{DateTime, Utc};
use forecast_core::{ForecastBundle, Symbol};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::clock::{self, Clock};
use crate::store::ForecastStore;

/// Age summary of one cached entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheEntryInfo {
    pub symbol: Symbol,
    pub computed_at: DateTime<Utc>,
    pub age_secs: u64,
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub total: usize,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

pub struct PredictionCache {
    entries: RwLock<HashMap<Symbol, Arc<ForecastBundle>>>,
    clock: Arc<dyn Clock>,
    store: Option<Arc<ForecastStore>>,
}

impl PredictionCache {
    /// Empty, memory-only cache
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
            store: None,
        }
    }

    /// Cache warmed from `store`; every later `put` is written through.
    /// A store that cannot be read leaves the cache empty.
    pub fn with_store(clock: Arc<dyn Clock>, store: Arc<ForecastStore>) -> Self {
        let mut entries = HashMap::new();
        match store.load_bundles() {
            Ok(bundles) => {
                for bundle in bundles {
                    entries.insert(bundle.symbol.clone(), Arc::new(bundle));
                }
                info!("Loaded {} forecast bundles from store", entries.len());
            }
            Err(e) => warn!("Failed to load cached forecasts, starting empty: {}", e),
        }

        Self {
            entries: RwLock::new(entries),
            clock,
            store: Some(store),
        }
    }

    pub fn get(&self, symbol: &Symbol) -> Option<Arc<ForecastBundle>> {
        self.entries.read().get(symbol).cloned()
    }

    /// Entry together with its age at the current clock reading
    pub fn get_with_age(&self, symbol: &Symbol) -> Option<(Arc<ForecastBundle>, Duration)> {
        let bundle = self.get(symbol)?;
        let age = self.age_of(&bundle);
        Some((bundle, age))
    }

    /// Age of a bundle already held by the caller, whatever the cache now
    /// holds for its symbol
    pub fn age_of(&self, bundle: &ForecastBundle) -> Duration {
        clock::age(self.clock.now(), bundle.computed_at)
    }

    /// Store `bundle` under `symbol`, replacing any previous entry
    pub fn put(&self, symbol: Symbol, bundle: ForecastBundle) -> Arc<ForecastBundle> {
        let bundle = Arc::new(bundle);
        self.entries.write().insert(symbol.clone(), Arc::clone(&bundle));
        debug!(symbol = %symbol, computed_at = %bundle.computed_at, "Cached forecast");

        if let Some(store) = &self.store {
            if let Err(e) = store.save_bundle(&bundle) {
                warn!("Failed to persist forecast for {}: {}", symbol, e);
            }
        }
        bundle
    }

    /// Time since the entry was computed; `None` if never stored
    pub fn age(&self, symbol: &Symbol) -> Option<Duration> {
        self.get_with_age(symbol).map(|(_, age)| age)
    }

    pub fn keys(&self) -> BTreeSet<Symbol> {
        self.entries.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Every entry with its age, ordered by symbol
    pub fn entries(&self) -> Vec<CacheEntryInfo> {
        let now = self.clock.now();
        let mut entries: Vec<CacheEntryInfo> = self
            .entries
            .read()
            .iter()
            .map(|(symbol, bundle)| CacheEntryInfo {
                symbol: symbol.clone(),
                computed_at: bundle.computed_at,
                age_secs: clock::age(now, bundle.computed_at).as_secs(),
            })
            .collect();
        entries.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        entries
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.read();
        CacheStats {
            total: entries.len(),
            oldest: entries.values().map(|b| b.computed_at).min(),
            newest: entries.values().map(|b| b.computed_at).max(),
        }
    }
}
