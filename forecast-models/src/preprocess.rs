//! Technical-indicator enrichment of raw daily series
//!
//! Derived columns: MA5/MA20/MA50, RSI(14) over simple rolling means of
//! gains and losses, MACD (EMA12 - EMA26) with its EMA9 signal line,
//! Bollinger bands (MA20 ± 2 sample σ), one-day volume change and one-day /
//! five-day price change. Rows where any column is still warming up are
//! dropped, so the first enriched row is the 50th input bar.

use chrono::NaiveDate;
use forecast_core::{ForecastError, ForecastResult, PriceSeries, Symbol};
use serde::{Deserialize, Serialize};

use crate::stats;

/// Fewest enriched rows a series must keep after warm-up
pub const MIN_ENRICHED_ROWS: usize = 60;

const RSI_PERIOD: usize = 14;
const BOLLINGER_WIDTH: f64 = 2.0;

/// A bar plus every derived indicator, all defined
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedBar {
    pub date: NaiveDate,
    pub close: f64,
    pub volume: f64,
    pub ma5: f64,
    pub ma20: f64,
    pub ma50: f64,
    pub rsi: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub bollinger_upper: f64,
    pub bollinger_lower: f64,
    pub volume_change: f64,
    pub return_1d: f64,
    pub return_5d: f64,
}

/// Output of [`preprocess`]; the input every forecaster consumes
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedSeries {
    pub symbol: Symbol,
    pub currency: String,
    pub bars: Vec<EnrichedBar>,
}

impl EnrichedSeries {
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }

    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }

    /// The first `len` rows, used to hold out a validation tail
    pub fn truncated(&self, len: usize) -> Self {
        Self {
            symbol: self.symbol.clone(),
            currency: self.currency.clone(),
            bars: self.bars[..len.min(self.bars.len())].to_vec(),
        }
    }
}

/// Enrich `series` with indicators.
///
/// Fails with [`ForecastError::Preprocess`] when dates are not strictly
/// increasing, a close is not a positive finite number, or fewer than
/// [`MIN_ENRICHED_ROWS`] rows survive the warm-up.
pub fn preprocess(series: &PriceSeries) -> ForecastResult<EnrichedSeries> {
    let bars = &series.bars;

    if let Some(pair) = bars.windows(2).find(|w| w[1].date <= w[0].date) {
        return Err(ForecastError::preprocess(format!(
            "{}: dates not strictly increasing at {}",
            series.symbol, pair[1].date
        )));
    }

    let mut closes = Vec::with_capacity(bars.len());
    for bar in bars {
        match stats::to_f64(bar.close) {
            Some(c) if c > 0.0 => closes.push(c),
            _ => {
                return Err(ForecastError::preprocess(format!(
                    "{}: invalid close {} on {}",
                    series.symbol, bar.close, bar.date
                )))
            }
        }
    }
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume as f64).collect();

    let ma5 = rolling_mean(&closes, 5);
    let ma20 = rolling_mean(&closes, 20);
    let ma50 = rolling_mean(&closes, 50);
    let std20 = rolling_sample_std(&closes, 20);
    let rsi14 = rsi(&closes, RSI_PERIOD);

    let ema12 = ema(&closes, 12);
    let ema26 = ema(&closes, 26);
    let macd: Vec<f64> = ema12.iter().zip(&ema26).map(|(a, b)| a - b).collect();
    let macd_signal = ema(&macd, 9);

    let volume_change = pct_change(&volumes, 1);
    let return_1d = pct_change(&closes, 1);
    let return_5d = pct_change(&closes, 5);

    let row_at = |i: usize| -> Option<EnrichedBar> {
        let ma20 = ma20[i]?;
        let std20 = std20[i]?;
        Some(EnrichedBar {
            date: bars[i].date,
            close: closes[i],
            volume: volumes[i],
            ma5: ma5[i]?,
            ma20,
            ma50: ma50[i]?,
            rsi: rsi14[i]?,
            macd: macd[i],
            macd_signal: macd_signal[i],
            bollinger_upper: ma20 + BOLLINGER_WIDTH * std20,
            bollinger_lower: ma20 - BOLLINGER_WIDTH * std20,
            volume_change: volume_change[i]?,
            return_1d: return_1d[i]?,
            return_5d: return_5d[i]?,
        })
    };
    let enriched: Vec<EnrichedBar> = (0..bars.len()).filter_map(row_at).collect();

    if enriched.len() < MIN_ENRICHED_ROWS {
        return Err(ForecastError::preprocess(format!(
            "{}: {} usable rows after warm-up, need {}",
            series.symbol,
            enriched.len(),
            MIN_ENRICHED_ROWS
        )));
    }

    Ok(EnrichedSeries {
        symbol: series.symbol.clone(),
        currency: series.currency.clone(),
        bars: enriched,
    })
}

// ============================================================================
// Indicator kernels
// ============================================================================

fn rolling_mean(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    let mut sum = 0.0;
    for i in 0..values.len() {
        sum += values[i];
        if i >= window {
            sum -= values[i - window];
        }
        if i + 1 >= window {
            out[i] = Some(sum / window as f64);
        }
    }
    out
}

fn rolling_sample_std(values: &[f64], window: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            if i + 1 < window {
                None
            } else {
                stats::sample_std_dev(&values[i + 1 - window..=i])
            }
        })
        .collect()
}

/// Exponential moving average seeded with the first value (no bias adjustment)
fn ema(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    for (i, v) in values.iter().enumerate() {
        if i == 0 {
            out.push(*v);
        } else {
            out.push(alpha * v + (1.0 - alpha) * out[i - 1]);
        }
    }
    out
}

/// RSI over simple rolling means of gains and losses.
///
/// A window with no movement at all reads as neutral (50); a window with no
/// losses reads as 100.
fn rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    for i in period..closes.len() {
        let (mut gain, mut loss) = (0.0, 0.0);
        for j in i + 1 - period..=i {
            let delta = closes[j] - closes[j - 1];
            if delta > 0.0 {
                gain += delta;
            } else {
                loss -= delta;
            }
        }
        let (gain, loss) = (gain / period as f64, loss / period as f64);
        out[i] = Some(if loss == 0.0 && gain == 0.0 {
            50.0
        } else if loss == 0.0 {
            100.0
        } else {
            100.0 - 100.0 / (1.0 + gain / loss)
        });
    }
    out
}

/// Fractional change over `periods` rows; a zero base reads as no change
fn pct_change(values: &[f64], periods: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            if i < periods {
                return None;
            }
            let base = values[i - periods];
            Some(if base == 0.0 { 0.0 } else { (values[i] - base) / base })
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{Days, NaiveDate};
    use forecast_core::PriceBar;
    use rust_decimal::Decimal;
    use rust_decimal::prelude::FromPrimitive;

    /// Deterministic trending series on consecutive business days
    pub(crate) fn synthetic_series(symbol: &str, len: usize) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        let dates = crate::calendar::business_days_after(start - Days::new(1), len);
        let bars = dates
            .into_iter()
            .enumerate()
            .map(|(i, date)| {
                let close = 100.0 + i as f64 * 0.25 + (i as f64 * 0.7).sin() * 2.0;
                let close = Decimal::from_f64(close).unwrap().round_dp(4);
                PriceBar {
                    date,
                    open: close,
                    high: close,
                    low: close,
                    close,
                    volume: 1_000 + (i as u64 % 7) * 100,
                }
            })
            .collect();
        PriceSeries::new(Symbol::new(symbol), "USD", bars)
    }

    #[test]
    fn test_warmup_rows_are_dropped() {
        let series = synthetic_series("AAPL", 200);
        let enriched = preprocess(&series).unwrap();
        assert_eq!(enriched.len(), 200 - 49);
        assert_eq!(enriched.bars[0].date, series.bars[49].date);
        assert_eq!(enriched.last_date(), series.last_date());
    }

    #[test]
    fn test_indicator_values() {
        let series = synthetic_series("AAPL", 120);
        let enriched = preprocess(&series).unwrap();
        let closes: Vec<f64> = series
            .bars
            .iter()
            .map(|b| stats::to_f64(b.close).unwrap())
            .collect();

        let first = &enriched.bars[0];
        let expected_ma50 = closes[..50].iter().sum::<f64>() / 50.0;
        assert!((first.ma50 - expected_ma50).abs() < 1e-9);
        let expected_ma5 = closes[45..50].iter().sum::<f64>() / 5.0;
        assert!((first.ma5 - expected_ma5).abs() < 1e-9);
        assert!(first.bollinger_upper > first.ma20 && first.bollinger_lower < first.ma20);
        assert!((0.0..=100.0).contains(&first.rsi));
        let expected_5d = (closes[49] - closes[44]) / closes[44];
        assert!((first.return_5d - expected_5d).abs() < 1e-12);
    }

    #[test]
    fn test_rsi_extremes() {
        let rising: Vec<f64> = (0..20).map(|i| i as f64 + 1.0).collect();
        assert_eq!(rsi(&rising, 14)[14], Some(100.0));
        let flat = vec![5.0; 20];
        assert_eq!(rsi(&flat, 14)[19], Some(50.0));
        assert_eq!(rsi(&flat, 14)[13], None);
    }

    #[test]
    fn test_ema_seeded_with_first_value() {
        let e = ema(&[10.0, 20.0], 3);
        assert_eq!(e[0], 10.0);
        assert!((e[1] - 15.0).abs() < 1e-12);
    }

    #[test]
    fn test_too_short_series_is_rejected() {
        let series = synthetic_series("AAPL", 100);
        let err = preprocess(&series).unwrap_err();
        assert!(matches!(err, ForecastError::Preprocess(_)));
    }

    #[test]
    fn test_unordered_dates_are_rejected() {
        let mut series = synthetic_series("AAPL", 150);
        series.bars.swap(10, 11);
        assert!(matches!(preprocess(&series), Err(ForecastError::Preprocess(_))));
    }

    #[test]
    fn test_truncated_keeps_prefix() {
        let enriched = preprocess(&synthetic_series("AAPL", 200)).unwrap();
        let head = enriched.truncated(80);
        assert_eq!(head.len(), 80);
        assert_eq!(head.bars[79], enriched.bars[79]);
    }
}
