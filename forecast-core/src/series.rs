//! Daily price history

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::Symbol;

/// One daily OHLCV bar, prices in the series currency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: u64,
}

/// Historical daily series for a symbol, oldest bar first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub symbol: Symbol,
    /// ISO currency code the prices are expressed in
    pub currency: String,
    pub bars: Vec<PriceBar>,
}

impl PriceSeries {
    pub fn new(symbol: Symbol, currency: impl Into<String>, bars: Vec<PriceBar>) -> Self {
        Self {
            symbol,
            currency: currency.into(),
            bars,
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last_close(&self) -> Option<Decimal> {
        self.bars.last().map(|b| b.close)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }
}

/// How much history to request from the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lookback {
    pub years: u32,
}

impl Lookback {
    pub const fn years(years: u32) -> Self {
        Self { years }
    }

    /// Range parameter in the provider's notation (`5y`)
    pub fn as_range(&self) -> String {
        format!("{}y", self.years)
    }
}

impl Default for Lookback {
    fn default() -> Self {
        Self::years(5)
    }
}
