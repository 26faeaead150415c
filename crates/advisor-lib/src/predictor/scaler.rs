//! Feature standardization
//!
//! A fit-once transformer that centres each column on its training mean and
//! divides by its training standard deviation.

use crate::error::{AdvisorError, Result};
use serde::{Deserialize, Serialize};

/// Per-column statistics learned during `fit`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    pub mean: Vec<f64>,
    pub std_dev: Vec<f64>,
}

/// Standardizes features to zero mean and unit variance
///
/// Uses the population standard deviation. A column with zero variance is
/// rejected at fit time rather than producing a division by zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    params: Option<ScalerParams>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self { params: None }
    }

    pub fn is_fitted(&self) -> bool {
        self.params.is_some()
    }

    pub fn params(&self) -> Option<&ScalerParams> {
        self.params.as_ref()
    }

    pub fn n_features(&self) -> Option<usize> {
        self.params.as_ref().map(|p| p.mean.len())
    }

    /// Learn per-column mean and standard deviation
    pub fn fit(&mut self, rows: &[Vec<f64>]) -> Result<()> {
        if self.params.is_some() {
            return Err(AdvisorError::AlreadyFitted("StandardScaler"));
        }
        if rows.len() < 2 {
            return Err(AdvisorError::InsufficientData(format!(
                "StandardScaler needs at least 2 rows, got {}",
                rows.len()
            )));
        }

        let n_features = rows[0].len();
        if let Some(bad) = rows.iter().find(|r| r.len() != n_features) {
            return Err(AdvisorError::DimensionMismatch {
                expected: n_features,
                actual: bad.len(),
            });
        }

        let n = rows.len() as f64;
        let mut mean = vec![0.0; n_features];
        for row in rows {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut std_dev = vec![0.0; n_features];
        for row in rows {
            for ((s, v), m) in std_dev.iter_mut().zip(row).zip(&mean) {
                *s += (v - m).powi(2);
            }
        }
        for (col, s) in std_dev.iter_mut().enumerate() {
            *s = (*s / n).sqrt();
            if *s <= f64::EPSILON * mean[col].abs().max(1.0) {
                return Err(AdvisorError::InsufficientData(format!(
                    "Feature column {} has zero variance",
                    col
                )));
            }
        }

        self.params = Some(ScalerParams { mean, std_dev });
        Ok(())
    }

    /// Standardize one row with the fitted statistics
    pub fn transform(&self, row: &[f64]) -> Result<Vec<f64>> {
        let params = self
            .params
            .as_ref()
            .ok_or(AdvisorError::NotFitted("StandardScaler"))?;

        if row.len() != params.mean.len() {
            return Err(AdvisorError::DimensionMismatch {
                expected: params.mean.len(),
                actual: row.len(),
            });
        }

        Ok(row
            .iter()
            .zip(params.mean.iter().zip(&params.std_dev))
            .map(|(v, (m, s))| (v - m) / s)
            .collect())
    }

    pub fn transform_all(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        rows.iter().map(|r| self.transform(r)).collect()
    }
}
