//! Yahoo Finance chart API response types

use chrono::{DateTime, NaiveDate};
use forecast_core::{PriceBar, StockMetadata, Symbol};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;

/// Top-level `/v8/finance/chart/{symbol}` response
#[derive(Debug, Clone, Deserialize)]
pub struct ChartResponse {
    pub chart: ChartEnvelope,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartEnvelope {
    #[serde(default)]
    pub result: Option<Vec<ChartResult>>,
    #[serde(default)]
    pub error: Option<ChartError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartError {
    pub code: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl std::fmt::Display for ChartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.description {
            Some(d) => write!(f, "{}: {}", self.code, d),
            None => f.write_str(&self.code),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartResult {
    pub meta: ChartMeta,
    #[serde(default)]
    pub timestamp: Vec<i64>,
    #[serde(default)]
    pub indicators: Indicators,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMeta {
    pub symbol: String,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub exchange_name: Option<String>,
    #[serde(default)]
    pub full_exchange_name: Option<String>,
    #[serde(default)]
    pub instrument_type: Option<String>,
    #[serde(default)]
    pub regular_market_price: Option<f64>,
    #[serde(default)]
    pub fifty_two_week_high: Option<f64>,
    #[serde(default)]
    pub fifty_two_week_low: Option<f64>,
    #[serde(default)]
    pub long_name: Option<String>,
    #[serde(default)]
    pub short_name: Option<String>,
    /// Exchange offset from UTC in seconds
    #[serde(default)]
    pub gmtoffset: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Indicators {
    #[serde(default)]
    pub quote: Vec<Quote>,
}

/// Column-oriented OHLCV; entries are null on halted sessions
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Quote {
    #[serde(default)]
    pub open: Vec<Option<f64>>,
    #[serde(default)]
    pub high: Vec<Option<f64>>,
    #[serde(default)]
    pub low: Vec<Option<f64>>,
    #[serde(default)]
    pub close: Vec<Option<f64>>,
    #[serde(default)]
    pub volume: Vec<Option<f64>>,
}

fn scaled(value: Option<f64>, factor: Decimal) -> Option<Decimal> {
    let v = value.filter(|v| v.is_finite())?;
    Decimal::from_f64(v).map(|d| (d * factor).round_dp(4))
}

impl ChartResult {
    /// Daily bars in exchange-local dates, prices multiplied by `factor`.
    /// Rows with any null price are dropped; a repeated date keeps the
    /// later row.
    pub fn to_bars(&self, factor: Decimal) -> Vec<PriceBar> {
        let Some(quote) = self.indicators.quote.first() else {
            return Vec::new();
        };
        let at = |col: &Vec<Option<f64>>, i: usize| col.get(i).copied().flatten();

        let mut bars: Vec<PriceBar> = Vec::with_capacity(self.timestamp.len());
        for (i, ts) in self.timestamp.iter().enumerate() {
            let Some(date) = local_date(*ts, self.meta.gmtoffset) else {
                continue;
            };
            let (Some(open), Some(high), Some(low), Some(close)) = (
                scaled(at(&quote.open, i), factor),
                scaled(at(&quote.high, i), factor),
                scaled(at(&quote.low, i), factor),
                scaled(at(&quote.close, i), factor),
            ) else {
                continue;
            };
            let volume = at(&quote.volume, i)
                .filter(|v| v.is_finite() && *v >= 0.0)
                .map(|v| v as u64)
                .unwrap_or(0);

            let bar = PriceBar {
                date,
                open,
                high,
                low,
                close,
                volume,
            };
            match bars.last_mut() {
                Some(last) if last.date == date => *last = bar,
                _ => bars.push(bar),
            }
        }
        bars.sort_by_key(|b| b.date);
        bars.dedup_by_key(|b| b.date);
        bars
    }

    /// Descriptive metadata, prices multiplied by `factor` and reported in
    /// `currency`
    pub fn to_metadata(&self, factor: Decimal, currency: &str) -> StockMetadata {
        let meta = &self.meta;
        StockMetadata {
            symbol: Some(Symbol::new(&meta.symbol)),
            short_name: meta.short_name.clone(),
            long_name: meta.long_name.clone(),
            regular_market_price: scaled(meta.regular_market_price, factor),
            fifty_two_week_high: scaled(meta.fifty_two_week_high, factor),
            fifty_two_week_low: scaled(meta.fifty_two_week_low, factor),
            currency: Some(currency.to_string()),
            exchange: meta
                .full_exchange_name
                .clone()
                .or_else(|| meta.exchange_name.clone()),
            ..StockMetadata::default()
        }
    }
}

fn local_date(timestamp: i64, gmtoffset: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(timestamp.checked_add(gmtoffset)?, 0).map(|dt| dt.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const SAMPLE: &str = r#"{
        "chart": {
            "result": [{
                "meta": {
                    "currency": "USD",
                    "symbol": "AAPL",
                    "exchangeName": "NMS",
                    "fullExchangeName": "NasdaqGS",
                    "instrumentType": "EQUITY",
                    "regularMarketPrice": 190.5,
                    "fiftyTwoWeekHigh": 199.62,
                    "fiftyTwoWeekLow": 164.08,
                    "longName": "Apple Inc.",
                    "shortName": "Apple Inc.",
                    "gmtoffset": -18000
                },
                "timestamp": [1704205800, 1704292200, 1704378600, 1704378660],
                "indicators": {
                    "quote": [{
                        "open":   [187.15, null, 182.15, 182.20],
                        "high":   [188.44, 185.88, 183.09, 183.10],
                        "low":    [183.89, 183.43, 180.88, 180.90],
                        "close":  [185.64, 184.25, 181.91, 181.95],
                        "volume": [82488700, 58414500, null, 71983600]
                    }]
                }
            }],
            "error": null
        }
    }"#;

    #[test]
    fn test_parse_chart_into_bars() {
        let response: ChartResponse = serde_json::from_str(SAMPLE).unwrap();
        let result = &response.chart.result.unwrap()[0];
        let bars = result.to_bars(Decimal::ONE);

        // Row with a null open is dropped; the repeated final date keeps the later row
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(bars[0].close, dec!(185.64));
        assert_eq!(bars[0].volume, 82_488_700);
        assert_eq!(bars[1].date, NaiveDate::from_ymd_opt(2024, 1, 4).unwrap());
        assert_eq!(bars[1].close, dec!(181.95));
        assert_eq!(bars[1].volume, 71_983_600);
    }

    #[test]
    fn test_conversion_factor_applies_to_prices() {
        let response: ChartResponse = serde_json::from_str(SAMPLE).unwrap();
        let result = &response.chart.result.unwrap()[0];
        let bars = result.to_bars(dec!(82.5));
        assert_eq!(bars[0].close, dec!(15315.3));

        let metadata = result.to_metadata(dec!(82.5), "INR");
        assert_eq!(metadata.currency.as_deref(), Some("INR"));
        assert_eq!(metadata.regular_market_price, Some(dec!(15716.25)));
        assert_eq!(metadata.exchange.as_deref(), Some("NasdaqGS"));
        assert_eq!(metadata.display_name(), "Apple Inc.");
    }

    #[test]
    fn test_parse_error_envelope() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let response: ChartResponse = serde_json::from_str(body).unwrap();
        assert!(response.chart.result.is_none());
        assert_eq!(
            response.chart.error.unwrap().to_string(),
            "Not Found: No data found, symbol may be delisted"
        );
    }
}
