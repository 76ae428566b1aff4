//! Descriptive stock metadata

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::Symbol;

/// Descriptive fields shown next to a forecast. Every field besides the
/// symbol is optional because providers fill them unevenly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockMetadata {
    pub symbol: Option<Symbol>,
    pub short_name: Option<String>,
    pub long_name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub market_cap: Option<Decimal>,
    pub pe_ratio: Option<Decimal>,
    pub dividend_yield: Option<Decimal>,
    pub fifty_two_week_high: Option<Decimal>,
    pub fifty_two_week_low: Option<Decimal>,
    pub regular_market_price: Option<Decimal>,
    pub currency: Option<String>,
    pub exchange: Option<String>,
    pub country: Option<String>,
}

impl StockMetadata {
    pub fn for_symbol(symbol: Symbol) -> Self {
        Self {
            symbol: Some(symbol),
            ..Self::default()
        }
    }

    /// Best human-readable name, falling back to the ticker
    pub fn display_name(&self) -> String {
        self.long_name
            .as_ref()
            .or(self.short_name.as_ref())
            .cloned()
            .or_else(|| self.symbol.as_ref().map(|s| s.to_string()))
            .unwrap_or_default()
    }
}
