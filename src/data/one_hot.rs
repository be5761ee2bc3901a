//! One-hot encoding for categorical string columns.
//!
//! Each input column is expanded into one indicator per category
//! seen at fit time (categories sorted lexicographically). With
//! [`DropPolicy::First`] the first category of every column is the
//! reference level and gets no indicator, which avoids perfectly
//! collinear dummies. Unseen categories at transform time either fail
//! or, with [`HandleUnknown::Ignore`], encode as an all-zero block
//! and are counted per column so callers can surface them.

use anyhow::{bail, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How to handle categories not seen during fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HandleUnknown {
    #[default]
    Error,
    Ignore,
}

/// Which category, if any, is left out of the encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DropPolicy {
    #[default]
    None,
    First,
}

#[derive(Debug, Clone, Default)]
pub struct OneHotEncoder {
    drop:           DropPolicy,
    handle_unknown: HandleUnknown,
}

impl OneHotEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_drop(mut self, drop: DropPolicy) -> Self {
        self.drop = drop;
        self
    }

    pub fn with_handle_unknown(mut self, strategy: HandleUnknown) -> Self {
        self.handle_unknown = strategy;
        self
    }

    pub fn fit(&self, columns: &[&[String]]) -> Result<FittedOneHotEncoder> {
        let mut categories = Vec::with_capacity(columns.len());
        for (i, col) in columns.iter().enumerate() {
            if col.is_empty() {
                bail!("cannot fit OneHotEncoder on an empty column (index {i})");
            }
            let sorted: BTreeSet<&String> = col.iter().collect();
            categories.push(sorted.into_iter().cloned().collect::<Vec<String>>());
        }

        let encoded: Vec<Vec<String>> = categories
            .iter()
            .map(|cats| match self.drop {
                DropPolicy::None  => cats.clone(),
                DropPolicy::First => cats[1..].to_vec(),
            })
            .collect();

        Ok(FittedOneHotEncoder {
            categories,
            encoded,
            handle_unknown: self.handle_unknown,
        })
    }
}

/// Output of [`FittedOneHotEncoder::transform`].
#[derive(Debug, Clone)]
pub struct Encoded {
    pub values: Array2<f64>,
    /// Number of unseen values per input column.
    pub unseen: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedOneHotEncoder {
    /// All categories seen at fit, sorted, per column.
    categories: Vec<Vec<String>>,
    /// Categories that own an indicator column (after the drop policy).
    encoded: Vec<Vec<String>>,
    handle_unknown: HandleUnknown,
}

impl FittedOneHotEncoder {
    pub fn categories(&self) -> &[Vec<String>] {
        &self.categories
    }

    pub fn n_features_in(&self) -> usize {
        self.categories.len()
    }

    pub fn n_features_out(&self) -> usize {
        self.encoded.iter().map(Vec::len).sum()
    }

    /// `"{column}_{category}"` for every indicator, in output order.
    pub fn feature_names(&self, input_names: &[String]) -> Vec<String> {
        input_names
            .iter()
            .zip(&self.encoded)
            .flat_map(|(name, cats)| cats.iter().map(move |c| format!("{name}_{c}")))
            .collect()
    }

    pub fn transform(&self, columns: &[&[String]]) -> Result<Encoded> {
        if columns.len() != self.n_features_in() {
            bail!(
                "OneHotEncoder expects {} columns, got {}",
                self.n_features_in(),
                columns.len()
            );
        }
        let rows = columns.first().map(|c| c.len()).unwrap_or(0);
        let mut values = Array2::<f64>::zeros((rows, self.n_features_out()));
        let mut unseen = vec![0usize; columns.len()];

        let mut offset = 0;
        for (col, data) in columns.iter().enumerate() {
            let known = &self.categories[col];
            let encoded = &self.encoded[col];
            for (row, value) in data.iter().enumerate() {
                if known.binary_search(value).is_err() {
                    if self.handle_unknown == HandleUnknown::Error {
                        bail!("unknown category '{value}' in column {col}");
                    }
                    unseen[col] += 1;
                    continue;
                }
                // the dropped reference level has no indicator
                if let Ok(idx) = encoded.binary_search(value) {
                    values[[row, offset + idx]] = 1.0;
                }
            }
            offset += encoded.len();
        }

        Ok(Encoded { values, unseen })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_full_encoding_sorted_categories() {
        let geo = strings(&["Spain", "France", "Germany", "France"]);
        let fitted = OneHotEncoder::new().fit(&[&geo[..]]).unwrap();
        assert_eq!(fitted.categories()[0], strings(&["France", "Germany", "Spain"]));

        let out = fitted.transform(&[&geo[..]]).unwrap().values;
        assert_eq!(out.shape(), &[4, 3]);
        assert_eq!(out.row(0).to_vec(), vec![0.0, 0.0, 1.0]);
        assert_eq!(out.row(1).to_vec(), vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_drop_first_reference_level() {
        let geo = strings(&["Spain", "France", "Germany"]);
        let fitted = OneHotEncoder::new().with_drop(DropPolicy::First).fit(&[&geo[..]]).unwrap();
        assert_eq!(fitted.n_features_out(), 2);
        assert_eq!(fitted.feature_names(&strings(&["Geography"])), strings(&["Geography_Germany", "Geography_Spain"]));

        let out = fitted.transform(&[&geo[..]]).unwrap().values;
        assert_eq!(out.row(0).to_vec(), vec![0.0, 1.0]); // Spain
        assert_eq!(out.row(1).to_vec(), vec![0.0, 0.0]); // France (reference)
        assert_eq!(out.row(2).to_vec(), vec![1.0, 0.0]); // Germany
    }

    #[test]
    fn test_unknown_error_policy() {
        let train = strings(&["Male", "Female"]);
        let fitted = OneHotEncoder::new().fit(&[&train[..]]).unwrap();
        assert!(fitted.transform(&[&strings(&["Other"])[..]]).is_err());
    }

    #[test]
    fn test_unknown_ignored_as_zeros_and_counted() {
        let train = strings(&["France", "Germany", "Spain"]);
        let fitted = OneHotEncoder::new()
            .with_drop(DropPolicy::First)
            .with_handle_unknown(HandleUnknown::Ignore)
            .fit(&[&train[..]])
            .unwrap();

        let enc = fitted.transform(&[&strings(&["Italy", "Spain", "Italy"])[..]]).unwrap();
        assert_eq!(enc.values.row(0).to_vec(), vec![0.0, 0.0]);
        assert_eq!(enc.values.row(1).to_vec(), vec![0.0, 1.0]);
        assert_eq!(enc.unseen, vec![2]);
    }

    #[test]
    fn test_multiple_columns_offsets() {
        let geo = strings(&["France", "Spain"]);
        let gender = strings(&["Male", "Female"]);
        let fitted = OneHotEncoder::new().fit(&[&geo[..], &gender[..]]).unwrap();
        let out = fitted.transform(&[&geo[..], &gender[..]]).unwrap().values;
        // [France, Spain | Female, Male]
        assert_eq!(out.row(0).to_vec(), vec![1.0, 0.0, 0.0, 1.0]);
        assert_eq!(out.row(1).to_vec(), vec![0.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_column_count_mismatch() {
        let geo = strings(&["France"]);
        let fitted = OneHotEncoder::new().fit(&[&geo[..]]).unwrap();
        assert!(fitted.transform(&[&geo[..], &geo[..]]).is_err());
    }
}
