//! Shared doubles for the unit tests in this crate

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use forecast_core::{
    AgreementLevel, ForecastBundle, ForecastError, ForecastResult, Lookback, MarketDataProvider,
    ModelAgreement, ModelId, PredictionPoint, PriceBar, PriceSeries, StockMetadata, Symbol,
};
use forecast_models::{calendar, EnrichedSeries, Forecaster};
use indexmap::IndexSet;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).unwrap()
}

pub fn symbols(raw: &[&str]) -> Vec<Symbol> {
    raw.iter().map(|s| Symbol::new(s)).collect()
}

/// Business-day history long enough to survive preprocessing
pub fn history(symbol: &Symbol, len: usize) -> PriceSeries {
    let first = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    let mut dates = vec![first];
    dates.extend(calendar::business_days_after(first, len.saturating_sub(1)));
    let bars = dates
        .into_iter()
        .enumerate()
        .map(|(i, date)| {
            let close = dec!(100) + Decimal::from(i as u64) * dec!(0.25);
            PriceBar {
                date,
                open: close,
                high: close + dec!(1),
                low: close - dec!(1),
                close,
                volume: 1_000 + i as u64 * 10,
            }
        })
        .collect();
    PriceSeries::new(symbol.clone(), "INR", bars)
}

/// Minimal bundle, for cache and store tests
pub fn bundle_for(symbol: &str, computed_at: DateTime<Utc>) -> ForecastBundle {
    let symbol = Symbol::new(symbol);
    let date = NaiveDate::from_ymd_opt(2025, 1, 7).unwrap();
    ForecastBundle {
        metadata: StockMetadata::for_symbol(symbol.clone()),
        predictions: vec![PredictionPoint::new(
            date,
            dec!(101),
            dec!(99),
            dec!(103),
            ModelId::Ensemble,
        )],
        history: history(&symbol, 5),
        models: vec![ModelId::SeasonalDecomposition],
        agreement: ModelAgreement {
            coefficient_of_variation_pct: Decimal::ZERO,
            max_difference_pct: Decimal::ZERO,
            level: AgreementLevel::High,
        },
        computed_at,
        symbol,
    }
}

/// Provider double that counts upstream calls
pub struct StubProvider {
    popular: Vec<Symbol>,
    universe: Mutex<Option<Vec<Symbol>>>,
    failing_history: HashSet<Symbol>,
    pub history_calls: AtomicUsize,
    pub metadata_calls: AtomicUsize,
    pub universe_calls: AtomicUsize,
}

impl StubProvider {
    pub fn new(popular: &[&str]) -> Self {
        Self {
            popular: symbols(popular),
            universe: Mutex::new(Some(symbols(popular))),
            failing_history: HashSet::new(),
            history_calls: AtomicUsize::new(0),
            metadata_calls: AtomicUsize::new(0),
            universe_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_universe(self, universe: &[&str]) -> Self {
        *self.universe.lock() = Some(symbols(universe));
        self
    }

    pub fn failing_history_for(mut self, symbol: &str) -> Self {
        self.failing_history.insert(Symbol::new(symbol));
        self
    }

    /// Make every later universe refresh fail
    pub fn break_universe(&self) {
        *self.universe.lock() = None;
    }

    pub fn upstream_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
            + self.metadata_calls.load(Ordering::SeqCst)
            + self.universe_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketDataProvider for StubProvider {
    async fn fetch_history(&self, symbol: &Symbol, _lookback: Lookback) -> ForecastResult<PriceSeries> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_history.contains(symbol) {
            return Err(ForecastError::fetch(symbol.as_str(), "no price data returned"));
        }
        Ok(history(symbol, 200))
    }

    async fn fetch_metadata(&self, symbol: &Symbol) -> ForecastResult<StockMetadata> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        Ok(StockMetadata::for_symbol(symbol.clone()))
    }

    fn list_popular(&self, limit: usize) -> Vec<Symbol> {
        self.popular.iter().take(limit).cloned().collect()
    }

    async fn refresh_symbol_universe(&self) -> ForecastResult<IndexSet<Symbol>> {
        self.universe_calls.fetch_add(1, Ordering::SeqCst);
        self.universe
            .lock()
            .clone()
            .map(|u| u.into_iter().collect())
            .ok_or_else(|| ForecastError::provider("all symbol sources unreachable"))
    }
}

/// Flat forecaster at `100 + offset`, optionally failing for one symbol
pub struct FixedForecaster {
    name: &'static str,
    offset: Decimal,
    fail_for: Option<Symbol>,
}

impl FixedForecaster {
    pub fn new(name: &'static str, offset: Decimal) -> Arc<dyn Forecaster> {
        Arc::new(Self {
            name,
            offset,
            fail_for: None,
        })
    }

    pub fn failing_for(name: &'static str, offset: Decimal, symbol: &str) -> Arc<dyn Forecaster> {
        Arc::new(Self {
            name,
            offset,
            fail_for: Some(Symbol::new(symbol)),
        })
    }
}

impl Forecaster for FixedForecaster {
    fn id(&self) -> ModelId {
        ModelId::Custom(self.name.to_string())
    }

    fn predict(&self, history: &EnrichedSeries, horizon: usize) -> ForecastResult<Vec<PredictionPoint>> {
        if self.fail_for.as_ref() == Some(&history.symbol) {
            return Err(ForecastError::model(self.name, "forced failure"));
        }
        let last = history
            .last_date()
            .ok_or_else(|| ForecastError::model(self.name, "empty history"))?;
        let price = dec!(100) + self.offset;
        Ok(calendar::business_days_after(last, horizon)
            .into_iter()
            .map(|d| PredictionPoint::new(d, price, price - dec!(1), price + dec!(1), self.id()))
            .collect())
    }
}
