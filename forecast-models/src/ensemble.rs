//! Ensemble combination of independent forecasters
//!
//! Every constituent forecaster sees the same history and horizon. Failures
//! are logged and excluded; the survivors are blended per date either by a
//! fitted [`MetaCombiner`] (only when every constituent succeeded) or by the
//! static weighted average, renormalised over the survivors. Bounds come from
//! the cross-model dispersion: `blended ± 1.96·σ`, σ being the population
//! standard deviation of the constituent prices on that date.

use forecast_core::{
    AgreementLevel, ForecastError, ForecastResult, ModelAgreement, ModelId, PredictionPoint,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{stats, EnrichedSeries, Forecaster, LinearMetaCombiner, MetaCombiner};

/// Two-sided 95% normal quantile
const Z_95: Decimal = Decimal::from_parts(196, 0, 0, false, 2);
const HOLDOUT_NUMERATOR: usize = 4;
const HOLDOUT_DENOMINATOR: usize = 5;

/// A constituent that failed during a combine
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelFailure {
    pub model: ModelId,
    pub reason: String,
}

/// How the blended price was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Blending {
    MetaCombiner,
    WeightedAverage,
}

/// Output of [`EnsembleCombiner::combine`]
#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleForecast {
    pub points: Vec<PredictionPoint>,
    pub contributors: Vec<ModelId>,
    pub failures: Vec<ModelFailure>,
    pub agreement: ModelAgreement,
    pub blending: Blending,
}

struct Member {
    forecaster: Arc<dyn Forecaster>,
    weight: Decimal,
}

/// Merges the output of N forecasters into one calibrated forecast
pub struct EnsembleCombiner {
    members: Vec<Member>,
    meta: Option<Arc<dyn MetaCombiner>>,
}

impl std::fmt::Debug for EnsembleCombiner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnsembleCombiner")
            .field("models", &self.model_ids())
            .field("weights", &self.weights())
            .field("meta", &self.meta)
            .finish()
    }
}

impl EnsembleCombiner {
    /// Build a combiner. `weights` default to equal; they must be
    /// non-negative, one per forecaster, and not all zero. They are
    /// normalised to sum to one.
    pub fn new(
        forecasters: Vec<Arc<dyn Forecaster>>,
        weights: Option<Vec<Decimal>>,
    ) -> ForecastResult<Self> {
        if forecasters.is_empty() {
            return Err(ForecastError::config("ensemble needs at least one forecaster"));
        }
        let weights = weights.unwrap_or_else(|| vec![Decimal::ONE; forecasters.len()]);
        if weights.len() != forecasters.len() {
            return Err(ForecastError::invalid_weights(format!(
                "{} weights for {} forecasters",
                weights.len(),
                forecasters.len()
            )));
        }
        if let Some(w) = weights.iter().find(|w| w.is_sign_negative() && !w.is_zero()) {
            return Err(ForecastError::invalid_weights(format!("negative weight {}", w)));
        }
        let total: Decimal = weights.iter().sum();
        if total.is_zero() {
            return Err(ForecastError::invalid_weights("weights sum to zero"));
        }

        let members = forecasters
            .into_iter()
            .zip(weights)
            .map(|(forecaster, w)| Member {
                forecaster,
                weight: w / total,
            })
            .collect();

        Ok(Self {
            members,
            meta: None,
        })
    }

    /// Attach a fitted meta-combiner; its input width must match the
    /// number of constituents.
    pub fn with_meta_combiner(mut self, meta: Arc<dyn MetaCombiner>) -> ForecastResult<Self> {
        if meta.input_width() != self.members.len() {
            return Err(ForecastError::config(format!(
                "meta-combiner expects {} inputs, ensemble has {} forecasters",
                meta.input_width(),
                self.members.len()
            )));
        }
        self.meta = Some(meta);
        Ok(self)
    }

    pub fn weights(&self) -> Vec<Decimal> {
        self.members.iter().map(|m| m.weight).collect()
    }

    pub fn model_ids(&self) -> Vec<ModelId> {
        self.members.iter().map(|m| m.forecaster.id()).collect()
    }

    pub fn has_meta_combiner(&self) -> bool {
        self.meta.is_some()
    }

    /// Run every constituent and blend the survivors.
    ///
    /// Each constituent must return exactly `horizon` points; dates come from
    /// the first survivor.
    pub fn combine(
        &self,
        history: &EnrichedSeries,
        horizon: usize,
    ) -> ForecastResult<EnsembleForecast> {
        if horizon == 0 {
            return Err(ForecastError::config("horizon must be at least one day"));
        }

        let mut outputs: Vec<(&Member, Vec<PredictionPoint>)> = Vec::new();
        let mut failures = Vec::new();
        for member in &self.members {
            let id = member.forecaster.id();
            match member.forecaster.predict(history, horizon) {
                Ok(points) if points.len() != horizon => {
                    return Err(ForecastError::MisalignedForecast {
                        model: id.to_string(),
                        expected: horizon,
                        actual: points.len(),
                    });
                }
                Ok(points) => outputs.push((member, points)),
                Err(e) => {
                    warn!(symbol = %history.symbol, model = %id, error = %e, "Forecaster failed, excluding from ensemble");
                    failures.push(ModelFailure {
                        model: id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if outputs.is_empty() {
            return Err(ForecastError::NoForecasterOutput {
                failures: failures.len(),
            });
        }

        // Per-date constituent prices, row = date
        let matrix: Vec<Vec<Decimal>> = (0..horizon)
            .map(|d| outputs.iter().map(|(_, points)| points[d].price).collect())
            .collect();

        let (blended, blending) = match self.meta_blend(&matrix, outputs.len(), history) {
            Some(prices) => (prices, Blending::MetaCombiner),
            None => (self.weighted_blend(&outputs, &matrix), Blending::WeightedAverage),
        };

        let dates = outputs[0].1.iter().map(|p| p.date);
        let mut points = Vec::with_capacity(horizon);
        for ((date, price), prices) in dates.zip(blended).zip(&matrix) {
            let price = price.round_dp(stats::PRICE_DP);
            let bounds = stats::decimal_population_std(prices)
                .and_then(|sigma| Z_95.checked_mul(sigma))
                .map(|band| band.round_dp(stats::PRICE_DP))
                .and_then(|band| Some((price.checked_sub(band)?, price.checked_add(band)?)));
            let Some((lower, upper)) = bounds else {
                return Err(ForecastError::model("ensemble", "dispersion overflow"));
            };
            points.push(PredictionPoint::new(date, price, lower, upper, ModelId::Ensemble));
        }

        let agreement = agreement(&matrix);
        info!(
            symbol = %history.symbol,
            contributors = outputs.len(),
            failed = failures.len(),
            blending = ?blending,
            agreement = ?agreement.level,
            average_variation_pct = %agreement.coefficient_of_variation_pct,
            max_difference_pct = %agreement.max_difference_pct,
            "Ensemble combined"
        );

        Ok(EnsembleForecast {
            points,
            contributors: outputs.iter().map(|(m, _)| m.forecaster.id()).collect(),
            failures,
            agreement,
            blending,
        })
    }

    fn meta_blend(
        &self,
        matrix: &[Vec<Decimal>],
        survivors: usize,
        history: &EnrichedSeries,
    ) -> Option<Vec<Decimal>> {
        let meta = self.meta.as_ref()?;
        if survivors != self.members.len() {
            debug!(symbol = %history.symbol, "Constituent missing, meta-combiner skipped");
            return None;
        }
        let blended: ForecastResult<Vec<Decimal>> = matrix.iter().map(|row| meta.blend(row)).collect();
        match blended {
            Ok(prices) => Some(prices),
            Err(e) => {
                warn!(symbol = %history.symbol, error = %e, "Meta-combiner failed, using weighted average");
                None
            }
        }
    }

    fn weighted_blend(
        &self,
        outputs: &[(&Member, Vec<PredictionPoint>)],
        matrix: &[Vec<Decimal>],
    ) -> Vec<Decimal> {
        let survivor_total: Decimal = outputs.iter().map(|(m, _)| m.weight).sum();
        let weights: Vec<Decimal> = if survivor_total.is_zero() {
            vec![Decimal::ONE / Decimal::from(outputs.len()); outputs.len()]
        } else {
            outputs.iter().map(|(m, _)| m.weight / survivor_total).collect()
        };
        matrix
            .iter()
            .map(|row| row.iter().zip(&weights).map(|(p, w)| *p * *w).sum())
            .collect()
    }

    /// Fit a linear meta-combiner on a held-out tail of `history`.
    ///
    /// The first 80% of rows are given to every constituent, which forecasts
    /// the length of the remaining 20%; the realised closes of that tail are
    /// the regression targets. Every constituent must succeed.
    pub fn fit_meta(&self, history: &EnrichedSeries) -> ForecastResult<LinearMetaCombiner> {
        let split = history.len() * HOLDOUT_NUMERATOR / HOLDOUT_DENOMINATOR;
        let train = history.truncated(split);
        let actual: Vec<f64> = history.bars[split..].iter().map(|b| b.close).collect();
        if actual.is_empty() {
            return Err(ForecastError::model("meta-combiner", "empty validation tail"));
        }

        let mut columns = Vec::with_capacity(self.members.len());
        for member in &self.members {
            let points = member.forecaster.predict(&train, actual.len())?;
            if points.len() != actual.len() {
                return Err(ForecastError::MisalignedForecast {
                    model: member.forecaster.id().to_string(),
                    expected: actual.len(),
                    actual: points.len(),
                });
            }
            let column = points
                .iter()
                .map(|p| stats::to_f64(p.price))
                .collect::<Option<Vec<f64>>>()
                .ok_or_else(|| ForecastError::model("meta-combiner", "price out of f64 range"))?;
            columns.push(column);
        }

        let features: Vec<Vec<f64>> = (0..actual.len())
            .map(|t| columns.iter().map(|c| c[t]).collect())
            .collect();
        let fitted = LinearMetaCombiner::fit(&features, &actual)?;
        info!(
            symbol = %history.symbol,
            observations = actual.len(),
            intercept = fitted.intercept,
            coefficients = ?fitted.coefficients,
            "Meta-combiner fitted"
        );
        Ok(fitted)
    }
}

/// Dispersion diagnostics over the per-date constituent prices
fn agreement(matrix: &[Vec<Decimal>]) -> ModelAgreement {
    let hundred = Decimal::ONE_HUNDRED;
    let mut cv_sum = Decimal::ZERO;
    let mut cv_count = 0u32;
    let mut max_sigma = Decimal::ZERO;
    let mut means = Vec::with_capacity(matrix.len());

    for row in matrix {
        let (Some(mean), Some(sigma)) =
            (stats::decimal_mean(row), stats::decimal_population_std(row))
        else {
            continue;
        };
        if !mean.is_zero() {
            cv_sum += sigma / mean;
            cv_count += 1;
        }
        max_sigma = max_sigma.max(sigma);
        means.push(mean);
    }

    let cv_pct = if cv_count == 0 {
        Decimal::ZERO
    } else {
        (cv_sum / Decimal::from(cv_count) * hundred).round_dp(2)
    };
    let max_difference_pct = match stats::decimal_mean(&means) {
        Some(m) if !m.is_zero() => (max_sigma / m * hundred).round_dp(2),
        _ => Decimal::ZERO,
    };

    ModelAgreement {
        coefficient_of_variation_pct: cv_pct,
        max_difference_pct,
        level: AgreementLevel::from_cv_pct(cv_pct),
    }
}
