//! Trend plus weekly seasonality forecaster

use chrono::{Datelike, NaiveDate};
use forecast_core::{ForecastError, ForecastResult, ModelId, PredictionPoint};

use crate::{calendar, stats, EnrichedSeries, Forecaster};

/// Roughly two trading years
const DEFAULT_TRAINING_WINDOW: usize = 504;
const MIN_TRAINING_BARS: usize = 30;
/// Two-sided 95% normal quantile
const Z_95: f64 = 1.96;

/// Least-squares linear trend over the recent closes plus a day-of-week
/// offset estimated from the detrended residuals. The interval is
/// ±1.96 σ of what remains after removing both.
#[derive(Debug, Clone)]
pub struct SeasonalForecaster {
    training_window: usize,
}

struct SeasonalFit {
    intercept: f64,
    slope: f64,
    weekday_offsets: [f64; 7],
    residual_std: f64,
    observations: usize,
}

impl SeasonalFit {
    fn level_at(&self, index: usize, date: NaiveDate) -> f64 {
        let weekday = date.weekday().num_days_from_monday() as usize;
        self.intercept + self.slope * index as f64 + self.weekday_offsets[weekday]
    }
}

impl Default for SeasonalForecaster {
    fn default() -> Self {
        Self::new(DEFAULT_TRAINING_WINDOW)
    }
}

impl SeasonalForecaster {
    pub fn new(training_window: usize) -> Self {
        Self {
            training_window: training_window.max(MIN_TRAINING_BARS),
        }
    }

    fn fit(&self, history: &EnrichedSeries) -> ForecastResult<SeasonalFit> {
        let start = history.len().saturating_sub(self.training_window);
        let bars = &history.bars[start..];
        let n = bars.len();
        if n < MIN_TRAINING_BARS {
            return Err(ForecastError::model(
                self.id().to_string(),
                format!("{} bars available, need {}", n, MIN_TRAINING_BARS),
            ));
        }

        let xs: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let ys: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let x_mean = stats::mean(&xs).unwrap_or_default();
        let y_mean = stats::mean(&ys).unwrap_or_default();
        let sxy: f64 = xs.iter().zip(&ys).map(|(x, y)| (x - x_mean) * (y - y_mean)).sum();
        let sxx: f64 = xs.iter().map(|x| (x - x_mean).powi(2)).sum();
        let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
        let intercept = y_mean - slope * x_mean;

        let detrended: Vec<f64> = xs
            .iter()
            .zip(&ys)
            .map(|(x, y)| y - (intercept + slope * x))
            .collect();

        let mut sums = [0.0; 7];
        let mut counts = [0usize; 7];
        for (bar, r) in bars.iter().zip(&detrended) {
            let wd = bar.date.weekday().num_days_from_monday() as usize;
            sums[wd] += r;
            counts[wd] += 1;
        }
        let mut weekday_offsets = [0.0; 7];
        for wd in 0..7 {
            if counts[wd] > 0 {
                weekday_offsets[wd] = sums[wd] / counts[wd] as f64;
            }
        }

        let remainder: Vec<f64> = bars
            .iter()
            .zip(&detrended)
            .map(|(bar, r)| r - weekday_offsets[bar.date.weekday().num_days_from_monday() as usize])
            .collect();
        let residual_std = stats::sample_std_dev(&remainder).unwrap_or_default();

        Ok(SeasonalFit {
            intercept,
            slope,
            weekday_offsets,
            residual_std,
            observations: n,
        })
    }
}

impl Forecaster for SeasonalForecaster {
    fn id(&self) -> ModelId {
        ModelId::SeasonalDecomposition
    }

    fn predict(
        &self,
        history: &EnrichedSeries,
        horizon: usize,
    ) -> ForecastResult<Vec<PredictionPoint>> {
        let last_date = history
            .last_date()
            .ok_or_else(|| ForecastError::model(self.id().to_string(), "empty history"))?;
        let fit = self.fit(history)?;
        let band = Z_95 * fit.residual_std;

        calendar::business_days_after(last_date, horizon)
            .into_iter()
            .enumerate()
            .map(|(step, date)| {
                let level = fit.level_at(fit.observations + step, date);
                let (price, lower, upper) = match (
                    stats::to_price(level),
                    stats::to_price(level - band),
                    stats::to_price(level + band),
                ) {
                    (Some(p), Some(l), Some(u)) => (p, l, u),
                    _ => {
                        return Err(ForecastError::model(
                            self.id().to_string(),
                            format!("non-finite forecast on {}", date),
                        ))
                    }
                };
                Ok(PredictionPoint::new(date, price, lower, upper, self.id()))
            })
            .collect()
    }
}
