// ============================================================
// Layer 4 — Column Preprocessor
// ============================================================
// Turns a mixed-type Frame into the dense numeric matrix every
// classifier consumes.
//
//   numeric columns      ──► StandardScaler ──┐
//                                              ├──► [n_rows × n_out]
//   categorical columns  ──► OneHotEncoder  ──┘
//                            (drop first, ignore unknown)
//
// Output layout: scaled numeric columns first (in the order they
// were given), then the one-hot blocks of the categorical columns.
// All statistics and category sets are frozen at fit time; serving
// never re-fits.

use anyhow::{bail, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::data::frame::Frame;
use crate::data::one_hot::{DropPolicy, FittedOneHotEncoder, HandleUnknown, OneHotEncoder};
use crate::data::scaler::{FittedStandardScaler, StandardScaler};
use crate::infra::metrics;

/// Unfitted preprocessing stage: which columns go through which transformer.
#[derive(Debug, Clone)]
pub struct ColumnTransformer {
    numeric:     Vec<String>,
    categorical: Vec<String>,
}

/// Build the standard churn preprocessor.
///
/// Fails if a column is listed both as numeric and categorical, or
/// if no columns are given at all.
pub fn build_preprocessor(numeric: &[String], categorical: &[String]) -> Result<ColumnTransformer> {
    if let Some(dup) = numeric.iter().find(|n| categorical.contains(n)) {
        bail!("column '{dup}' listed as both numeric and categorical");
    }
    if numeric.is_empty() && categorical.is_empty() {
        bail!("preprocessor needs at least one column");
    }
    Ok(ColumnTransformer {
        numeric:     numeric.to_vec(),
        categorical: categorical.to_vec(),
    })
}

impl ColumnTransformer {
    pub fn fit(&self, frame: &Frame) -> Result<FittedColumnTransformer> {
        let numeric: Vec<&[f64]> = self
            .numeric
            .iter()
            .map(|n| frame.numeric(n))
            .collect::<Result<_>>()?;
        let categorical: Vec<&[String]> = self
            .categorical
            .iter()
            .map(|n| frame.categorical(n))
            .collect::<Result<_>>()?;

        let scaler = StandardScaler::new().fit(&numeric)?;
        let encoder = OneHotEncoder::new()
            .with_drop(DropPolicy::First)
            .with_handle_unknown(HandleUnknown::Ignore)
            .fit(&categorical)?;

        let fitted = FittedColumnTransformer {
            numeric: self.numeric.clone(),
            categorical: self.categorical.clone(),
            scaler,
            encoder,
        };
        tracing::debug!(
            "Preprocessor fitted: {} numeric + {} categorical → {} features",
            fitted.numeric.len(),
            fitted.categorical.len(),
            fitted.n_features_out()
        );
        for (i, name) in fitted.numeric.iter().enumerate() {
            tracing::debug!(
                "  {name}: mean {:.3}, scale {:.3}",
                fitted.scaler.mean()[i],
                fitted.scaler.scale()[i]
            );
        }
        for (name, categories) in fitted.categorical.iter().zip(fitted.encoder.categories()) {
            tracing::debug!("  {name}: categories {:?} (first dropped)", categories);
        }
        Ok(fitted)
    }
}

/// Frozen preprocessing stage. Serialized inside the model artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedColumnTransformer {
    numeric:     Vec<String>,
    categorical: Vec<String>,
    scaler:      FittedStandardScaler,
    encoder:     FittedOneHotEncoder,
}

impl FittedColumnTransformer {
    pub fn n_features_out(&self) -> usize {
        self.numeric.len() + self.encoder.n_features_out()
    }

    pub fn feature_names_out(&self) -> Vec<String> {
        let mut names = self.numeric.clone();
        names.extend(self.encoder.feature_names(&self.categorical));
        names
    }


    pub fn transform(&self, frame: &Frame) -> Result<Array2<f64>> {
        let rows = frame.n_rows();
        let mut out = Array2::<f64>::zeros((rows, self.n_features_out()));

        for (col, name) in self.numeric.iter().enumerate() {
            let values = frame.numeric(name)?;
            for (row, &v) in values.iter().enumerate() {
                out[[row, col]] = self.scaler.transform_value(col, v);
            }
        }

        if !self.categorical.is_empty() {
            let categorical: Vec<&[String]> = self
                .categorical
                .iter()
                .map(|n| frame.categorical(n))
                .collect::<Result<_>>()?;
            let encoded = self.encoder.transform(&categorical)?;

            let offset = self.numeric.len();
            out.slice_mut(ndarray::s![.., offset..]).assign(&encoded.values);

            for (name, &count) in self.categorical.iter().zip(&encoded.unseen) {
                if count > 0 {
                    tracing::warn!("{count} unseen value(s) in column '{name}' encoded as all zeros");
                    metrics::record_unseen_category(name, count);
                }
            }
        }

        Ok(out)
    }
}
