//! Learned blending of constituent forecasts

use forecast_core::{ForecastError, ForecastResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{fmt, fs, path::Path};

use crate::stats;

const META_MODEL: &str = "meta-combiner";
/// Ridge term keeping the normal equations solvable when constituents agree closely
const RIDGE: f64 = 1e-8;

/// Maps the per-date vector of constituent prices to one blended price
pub trait MetaCombiner: Send + Sync + fmt::Debug {
    /// Number of constituent prices expected per call
    fn input_width(&self) -> usize;

    fn blend(&self, prices: &[Decimal]) -> ForecastResult<Decimal>;
}

/// `intercept + Σ coefficient·price`, fitted by least squares
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearMetaCombiner {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LinearMetaCombiner {
    pub fn new(intercept: f64, coefficients: Vec<f64>) -> Self {
        Self {
            intercept,
            coefficients,
        }
    }

    /// Ordinary least squares with an intercept column.
    ///
    /// `features[i]` holds the constituent prices for observation `i`,
    /// `targets[i]` the realised price.
    pub fn fit(features: &[Vec<f64>], targets: &[f64]) -> ForecastResult<Self> {
        let width = features.first().map(Vec::len).unwrap_or_default();
        if features.len() != targets.len() || width == 0 {
            return Err(ForecastError::model(
                META_MODEL,
                format!(
                    "{} feature rows for {} targets",
                    features.len(),
                    targets.len()
                ),
            ));
        }
        if features.iter().any(|row| row.len() != width) {
            return Err(ForecastError::model(META_MODEL, "ragged feature rows"));
        }
        if features.len() <= width {
            return Err(ForecastError::model(
                META_MODEL,
                format!("{} observations for {} inputs", features.len(), width),
            ));
        }

        // Normal equations (XᵀX) β = Xᵀy with X = [1 | features]
        let dim = width + 1;
        let mut xtx = vec![vec![0.0; dim]; dim];
        let mut xty = vec![0.0; dim];
        for (row, y) in features.iter().zip(targets) {
            let x: Vec<f64> = std::iter::once(1.0).chain(row.iter().copied()).collect();
            for i in 0..dim {
                xty[i] += x[i] * y;
                for j in 0..dim {
                    xtx[i][j] += x[i] * x[j];
                }
            }
        }
        for (i, row) in xtx.iter_mut().enumerate().skip(1) {
            row[i] += RIDGE * row[i].abs().max(1.0);
        }

        let beta = solve(xtx, xty)
            .ok_or_else(|| ForecastError::model(META_MODEL, "singular design matrix"))?;
        if beta.iter().any(|b| !b.is_finite()) {
            return Err(ForecastError::model(META_MODEL, "non-finite coefficients"));
        }

        Ok(Self {
            intercept: beta[0],
            coefficients: beta[1..].to_vec(),
        })
    }

    pub fn load(path: impl AsRef<Path>) -> ForecastResult<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            ForecastError::storage(format!("reading {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| ForecastError::storage(format!("parsing {}: {}", path.display(), e)))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> ForecastResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    ForecastError::storage(format!("creating {}: {}", parent.display(), e))
                })?;
            }
        }
        let raw = serde_json::to_string_pretty(self)
            .map_err(|e| ForecastError::storage(e.to_string()))?;
        fs::write(path, raw)
            .map_err(|e| ForecastError::storage(format!("writing {}: {}", path.display(), e)))
    }
}

impl MetaCombiner for LinearMetaCombiner {
    fn input_width(&self) -> usize {
        self.coefficients.len()
    }

    fn blend(&self, prices: &[Decimal]) -> ForecastResult<Decimal> {
        if prices.len() != self.coefficients.len() {
            return Err(ForecastError::model(
                META_MODEL,
                format!(
                    "expected {} inputs, got {}",
                    self.coefficients.len(),
                    prices.len()
                ),
            ));
        }
        let mut value = self.intercept;
        for (coef, price) in self.coefficients.iter().zip(prices) {
            let price = stats::to_f64(*price)
                .ok_or_else(|| ForecastError::model(META_MODEL, "price out of f64 range"))?;
            value += coef * price;
        }
        stats::to_price(value).ok_or_else(|| ForecastError::model(META_MODEL, "non-finite blend"))
    }
}

/// Gaussian elimination with partial pivoting
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Some(x)
}
