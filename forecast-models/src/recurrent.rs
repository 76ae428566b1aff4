//! Windowed attention forecaster over log returns
//!
//! Each historical window of `window` returns acts as a key and the return
//! that followed it as the value. The latest window is the query: the next
//! return is the softmax-weighted mean of the values, scored by negative
//! mean squared distance between key and query. The forecast rolls forward
//! one business day at a time, feeding each predicted return back into the
//! query.

use forecast_core::{ForecastError, ForecastResult, ModelId, PredictionPoint};
use std::collections::VecDeque;

use crate::{calendar, stats, EnrichedSeries, Forecaster};

const DEFAULT_WINDOW: usize = 60;
const DEFAULT_MAX_CONTEXT: usize = 750;
/// Fewest key windows needed beyond the query window
const MIN_KEYS: usize = 20;
const BASE_SPREAD: f64 = 0.02;
const SPREAD_PER_DAY: f64 = 0.001;

#[derive(Debug, Clone)]
pub struct AttentionForecaster {
    window: usize,
    max_context: usize,
}

impl Default for AttentionForecaster {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW, DEFAULT_MAX_CONTEXT)
    }
}

impl AttentionForecaster {
    pub fn new(window: usize, max_context: usize) -> Self {
        Self {
            window: window.max(1),
            max_context: max_context.max(MIN_KEYS),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Attention-weighted next return for `query` over the historical keys
    fn attend(&self, returns: &[f64], key_ends: &[usize], query: &[f64], scale: f64) -> f64 {
        let scores: Vec<f64> = key_ends
            .iter()
            .map(|&t| {
                let key = &returns[t - self.window..t];
                let mse = key
                    .iter()
                    .zip(query)
                    .map(|(k, q)| (k - q).powi(2))
                    .sum::<f64>()
                    / self.window as f64;
                -mse / scale
            })
            .collect();
        let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        let mut weighted = 0.0;
        let mut total = 0.0;
        for (&t, score) in key_ends.iter().zip(&scores) {
            let w = (score - max).exp();
            weighted += w * returns[t];
            total += w;
        }
        if total > 0.0 {
            weighted / total
        } else {
            0.0
        }
    }
}

impl Forecaster for AttentionForecaster {
    fn id(&self) -> ModelId {
        ModelId::RecurrentAttention
    }

    fn predict(
        &self,
        history: &EnrichedSeries,
        horizon: usize,
    ) -> ForecastResult<Vec<PredictionPoint>> {
        let closes = history.closes();
        let returns = stats::log_returns(&closes);
        let needed = self.window + MIN_KEYS;
        if returns.len() < needed || returns.len() + 1 != closes.len() {
            return Err(ForecastError::model(
                self.id().to_string(),
                format!(
                    "{} usable returns, need {} positive consecutive closes",
                    returns.len(),
                    needed + 1
                ),
            ));
        }
        let (Some(last_date), Some(mut price)) = (history.last_date(), history.last_close())
        else {
            return Err(ForecastError::model(self.id().to_string(), "empty history"));
        };

        // Key windows end at t (exclusive) and predict returns[t]
        let first_end = self.window.max(returns.len().saturating_sub(self.max_context));
        let key_ends: Vec<usize> = (first_end..returns.len()).collect();
        let scale = 2.0 * stats::variance(&returns).unwrap_or_default().max(1e-12);

        let mut query: VecDeque<f64> = returns[returns.len() - self.window..].iter().copied().collect();
        let mut points = Vec::with_capacity(horizon);

        for (day, date) in calendar::business_days_after(last_date, horizon)
            .into_iter()
            .enumerate()
        {
            let next = self.attend(&returns, &key_ends, query.make_contiguous(), scale);
            price *= next.exp();
            query.pop_front();
            query.push_back(next);

            let spread = BASE_SPREAD + SPREAD_PER_DAY * day as f64;
            let (Some(p), Some(lower), Some(upper)) = (
                stats::to_price(price),
                stats::to_price(price * (1.0 - spread)),
                stats::to_price(price * (1.0 + spread)),
            ) else {
                return Err(ForecastError::model(
                    self.id().to_string(),
                    format!("non-finite forecast on {}", date),
                ));
            };
            points.push(PredictionPoint::new(date, p, lower, upper, self.id()));
        }

        Ok(points)
    }
}
