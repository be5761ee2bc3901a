//! Z-score scaling for numeric columns.
//!
//! `StandardScaler` learns a per-column mean and population standard
//! deviation at fit time; `FittedStandardScaler` applies
//! `(x - mean) / std` with those frozen statistics. A constant column
//! gets a scale of 1.0 so it maps to zero instead of NaN.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default)]
pub struct StandardScaler;

impl StandardScaler {
    pub fn new() -> Self {
        Self
    }

    /// Learn mean/std for each column. All columns must be non-empty,
    /// equally long and finite.
    pub fn fit(&self, columns: &[&[f64]]) -> Result<FittedStandardScaler> {
        let mut mean  = Vec::with_capacity(columns.len());
        let mut scale = Vec::with_capacity(columns.len());

        for (i, col) in columns.iter().enumerate() {
            if col.is_empty() {
                bail!("cannot fit StandardScaler on an empty column (index {i})");
            }
            if let Some(v) = col.iter().find(|v| !v.is_finite()) {
                bail!("StandardScaler got non-finite value {v} in column {i}");
            }
            let n  = col.len() as f64;
            let mu = col.iter().sum::<f64>() / n;
            let var = col.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / n;
            let std = var.sqrt();

            mean.push(mu);
            scale.push(if std > f64::EPSILON { std } else { 1.0 });
        }

        Ok(FittedStandardScaler { mean, scale })
    }
}

/// Frozen per-column statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedStandardScaler {
    mean:  Vec<f64>,
    scale: Vec<f64>,
}

impl FittedStandardScaler {
    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    #[inline]
    pub fn transform_value(&self, col: usize, value: f64) -> f64 {
        (value - self.mean[col]) / self.scale[col]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_mean_unit_variance() {
        let col = [1.0, 2.0, 3.0, 4.0];
        let fitted = StandardScaler::new().fit(&[&col[..]]).unwrap();
        let out: Vec<f64> = col.iter().map(|&v| fitted.transform_value(0, v)).collect();

        let mean = out.iter().sum::<f64>() / 4.0;
        let var  = out.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / 4.0;
        assert!(mean.abs() < 1e-12);
        assert!((var - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_constant_column_maps_to_zero() {
        let col = [5.0, 5.0, 5.0];
        let fitted = StandardScaler::new().fit(&[&col[..]]).unwrap();
        assert_eq!(fitted.scale(), &[1.0]);
        assert_eq!(fitted.transform_value(0, 5.0), 0.0);
    }

    #[test]
    fn test_statistics_are_frozen() {
        let fitted = StandardScaler::new().fit(&[&[0.0, 10.0][..]]).unwrap();
        // unseen value is scaled with the training statistics
        assert_eq!(fitted.transform_value(0, 15.0), 2.0);
    }

    #[test]
    fn test_empty_and_nan_rejected() {
        let empty: [f64; 0] = [];
        assert!(StandardScaler::new().fit(&[&empty[..]]).is_err());
        assert!(StandardScaler::new().fit(&[&[1.0, f64::NAN][..]]).is_err());
    }
}
