//! Prediction points, model identities and cached forecast bundles

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{fmt, time::Duration};

use crate::{PriceSeries, StockMetadata, Symbol};

// ============================================================================
// Model identity
// ============================================================================

/// Which model produced a prediction point
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ModelId {
    /// Windowed attention over recent returns
    RecurrentAttention,
    /// Trend plus weekly seasonality
    SeasonalDecomposition,
    /// Output of the ensemble combiner
    Ensemble,
    /// Any other forecaster plugged into the ensemble
    Custom(String),
}

impl ModelId {
    pub fn display_name(&self) -> &str {
        match self {
            ModelId::RecurrentAttention => "LSTM-Attention",
            ModelId::SeasonalDecomposition => "Prophet",
            ModelId::Ensemble => "Advanced Ensemble",
            ModelId::Custom(name) => name,
        }
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl From<String> for ModelId {
    fn from(value: String) -> Self {
        match value.as_str() {
            "LSTM-Attention" => ModelId::RecurrentAttention,
            "Prophet" => ModelId::SeasonalDecomposition,
            "Advanced Ensemble" => ModelId::Ensemble,
            _ => ModelId::Custom(value),
        }
    }
}

impl From<ModelId> for String {
    fn from(value: ModelId) -> Self {
        value.display_name().to_string()
    }
}

// ============================================================================
// Prediction point
// ============================================================================

/// A single dated forecast with its uncertainty band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionPoint {
    pub date: NaiveDate,
    pub price: Decimal,
    pub lower: Decimal,
    pub upper: Decimal,
    pub model: ModelId,
}

impl PredictionPoint {
    /// Build a point, widening the band where needed so that
    /// `lower <= price <= upper` always holds.
    pub fn new(
        date: NaiveDate,
        price: Decimal,
        lower: Decimal,
        upper: Decimal,
        model: ModelId,
    ) -> Self {
        Self {
            date,
            price,
            lower: lower.min(price),
            upper: upper.max(price),
            model,
        }
    }

    pub fn band_width(&self) -> Decimal {
        self.upper - self.lower
    }

    pub fn is_consistent(&self) -> bool {
        self.lower <= self.price && self.price <= self.upper
    }
}

// ============================================================================
// Model agreement
// ============================================================================

/// Qualitative agreement between ensemble constituents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgreementLevel {
    High,
    Medium,
    Low,
}

impl AgreementLevel {
    /// Classify a mean coefficient of variation given in percent
    pub fn from_cv_pct(cv_pct: Decimal) -> Self {
        if cv_pct < Decimal::from(5) {
            AgreementLevel::High
        } else if cv_pct < Decimal::from(10) {
            AgreementLevel::Medium
        } else {
            AgreementLevel::Low
        }
    }
}

/// Dispersion diagnostics over the constituent forecasts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelAgreement {
    /// Mean over dates of σ/mean, in percent
    pub coefficient_of_variation_pct: Decimal,
    /// Largest per-date σ relative to the mean price over the horizon, in percent
    pub max_difference_pct: Decimal,
    pub level: AgreementLevel,
}

// ============================================================================
// Forecast bundle
// ============================================================================

/// Everything cached for one symbol. Immutable once built; a refresh swaps
/// the whole bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastBundle {
    pub symbol: Symbol,
    pub metadata: StockMetadata,
    /// Ensemble output, one point per business day of the horizon
    pub predictions: Vec<PredictionPoint>,
    /// History snapshot the predictions were computed from
    pub history: PriceSeries,
    /// Constituent models that contributed
    pub models: Vec<ModelId>,
    pub agreement: ModelAgreement,
    pub computed_at: DateTime<Utc>,
}

impl ForecastBundle {
    /// Age at `now`, clamped to zero if the clock runs behind the timestamp
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.computed_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    pub fn is_fresh_at(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.age_at(now) < max_age
    }

    pub fn last_price(&self) -> Option<Decimal> {
        self.history.last_close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
    }

    #[test]
    fn test_point_band_is_widened_around_price() {
        let p = PredictionPoint::new(date(), dec!(100), dec!(101), dec!(99), ModelId::Ensemble);
        assert_eq!(p.lower, dec!(100));
        assert_eq!(p.upper, dec!(100));
        assert!(p.is_consistent());

        let q = PredictionPoint::new(date(), dec!(100), dec!(95), dec!(105), ModelId::Ensemble);
        assert_eq!(q.band_width(), dec!(10));
    }

    #[test]
    fn test_model_id_names_roundtrip_through_serde() {
        let json = serde_json::to_string(&ModelId::RecurrentAttention).unwrap();
        assert_eq!(json, "\"LSTM-Attention\"");
        let back: ModelId = serde_json::from_str("\"Prophet\"").unwrap();
        assert_eq!(back, ModelId::SeasonalDecomposition);
        let custom: ModelId = serde_json::from_str("\"GRU\"").unwrap();
        assert_eq!(custom, ModelId::Custom("GRU".into()));
    }

    #[test]
    fn test_agreement_thresholds() {
        assert_eq!(AgreementLevel::from_cv_pct(dec!(4.99)), AgreementLevel::High);
        assert_eq!(AgreementLevel::from_cv_pct(dec!(5)), AgreementLevel::Medium);
        assert_eq!(AgreementLevel::from_cv_pct(dec!(12)), AgreementLevel::Low);
    }

    #[test]
    fn test_bundle_age_is_clamped() {
        let computed_at = Utc.with_ymd_and_hms(2025, 3, 3, 12, 0, 0).unwrap();
        let bundle = ForecastBundle {
            symbol: Symbol::new("AAPL"),
            metadata: StockMetadata::default(),
            predictions: vec![],
            history: PriceSeries::new(Symbol::new("AAPL"), "USD", vec![]),
            models: vec![],
            agreement: ModelAgreement {
                coefficient_of_variation_pct: Decimal::ZERO,
                max_difference_pct: Decimal::ZERO,
                level: AgreementLevel::High,
            },
            computed_at,
        };

        let before = computed_at - chrono::Duration::minutes(5);
        assert_eq!(bundle.age_at(before), Duration::ZERO);

        let later = computed_at + chrono::Duration::hours(3);
        assert_eq!(bundle.age_at(later), Duration::from_secs(3 * 3600));
        assert!(bundle.is_fresh_at(later, Duration::from_secs(24 * 3600)));
        assert!(!bundle.is_fresh_at(later, Duration::from_secs(3600)));
    }
}
