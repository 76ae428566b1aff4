//! Small statistical helpers shared by the forecasters and the combiner

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, MathematicalOps};

/// Decimal places kept on prices produced by the models
pub const PRICE_DP: u32 = 4;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population variance (n denominator)
pub fn variance(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    Some(values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n-1 denominator)
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let m = mean(values)?;
    let sum_sq: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((sum_sq / (n - 1) as f64).sqrt())
}

/// ln(p[i] / p[i-1]) for each consecutive pair of positive prices
pub fn log_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .filter(|w| w[0] > 0.0 && w[1] > 0.0)
        .map(|w| (w[1] / w[0]).ln())
        .collect()
}

/// Finite f64 to a Decimal price, rounded to [`PRICE_DP`]
pub fn to_price(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_f64(value).map(|d| d.round_dp(PRICE_DP))
}

pub fn to_f64(value: Decimal) -> Option<f64> {
    value.to_f64().filter(|v| v.is_finite())
}

pub fn decimal_mean(values: &[Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    let total = values
        .iter()
        .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(*v))?;
    total.checked_div(Decimal::from(values.len()))
}

/// Population standard deviation of decimal values; zero for a single value.
/// `None` when empty or when the squared deviations leave Decimal range.
pub fn decimal_population_std(values: &[Decimal]) -> Option<Decimal> {
    let m = decimal_mean(values)?;
    let sum_sq = values.iter().try_fold(Decimal::ZERO, |acc, v| {
        let d = v.checked_sub(m)?;
        acc.checked_add(d.checked_mul(d)?)
    })?;
    sum_sq.checked_div(Decimal::from(values.len()))?.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_population_std_of_two_points_is_half_the_gap() {
        let std = decimal_population_std(&[dec!(100), dec!(110)]).unwrap();
        assert!((std - dec!(5)).abs() < dec!(0.000001));
        assert_eq!(decimal_population_std(&[dec!(42)]), Some(Decimal::ZERO));
        assert_eq!(decimal_population_std(&[]), None);
    }

    #[test]
    fn test_population_std_out_of_range_is_none() {
        let far_apart = [dec!(1), dec!(1_000_000_000_000_000)];
        assert_eq!(decimal_population_std(&far_apart), None);
        assert_eq!(decimal_mean(&[Decimal::MAX, Decimal::MAX]), None);
    }

    #[test]
    fn test_sample_std_dev() {
        let s = sample_std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((s - 2.138).abs() < 1e-3);
        assert!(sample_std_dev(&[1.0]).is_none());
    }

    #[test]
    fn test_to_price_rejects_non_finite() {
        assert_eq!(to_price(101.123456), Some(dec!(101.1235)));
        assert!(to_price(f64::NAN).is_none());
        assert!(to_price(f64::INFINITY).is_none());
    }

    #[test]
    fn test_log_returns_skip_non_positive() {
        let r = log_returns(&[100.0, 110.0, 0.0, 50.0]);
        assert_eq!(r.len(), 1);
        assert!((r[0] - (1.1f64).ln()).abs() < 1e-12);
    }
}
