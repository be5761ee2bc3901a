// ============================================================
// Layer 4 — Dataset Loader
// ============================================================
// Reads the bank churn CSV and splits it into a feature frame and
// a binary target vector.
//
//   RowNumber,CustomerId,Surname,CreditScore,Geography,...,Exited
//       │          │        │                                  │
//       └── dropped (identifiers) ──┘                 target ──┘
//
// Column types are inferred the way a dataframe library would:
// a column whose every cell parses as a number is numeric,
// anything else is categorical.

use anyhow::{anyhow, bail, Context, Result};
use std::{io, path::PathBuf};

use crate::data::frame::{Column, Frame};

/// Target column of the churn dataset.
pub const TARGET_COLUMN: &str = "Exited";

/// Identifier-like columns that carry no signal.
pub const ID_COLUMNS: [&str; 3] = ["RowNumber", "CustomerId", "Surname"];

/// Features and target materialised from one CSV file.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub features: Frame,
    pub target:   Vec<u8>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.target.len()
    }

    pub fn positive_rate(&self) -> f64 {
        if self.target.is_empty() {
            return 0.0;
        }
        self.target.iter().filter(|&&y| y == 1).count() as f64 / self.target.len() as f64
    }
}

pub struct CsvDatasetLoader {
    path:   PathBuf,
    target: String,
    drop:   Vec<String>,
}

impl CsvDatasetLoader {
    /// Loader for the churn layout: target `Exited`, identifiers dropped.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path:   path.into(),
            target: TARGET_COLUMN.to_string(),
            drop:   ID_COLUMNS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn load(&self) -> Result<Dataset> {
        tracing::info!("Loading dataset from '{}'", self.path.display());
        let reader = csv::Reader::from_path(&self.path)
            .with_context(|| format!("Cannot open dataset '{}'", self.path.display()))?;
        let dataset = self
            .read(reader)
            .with_context(|| format!("Cannot load dataset '{}'", self.path.display()))?;
        tracing::info!(
            "Loaded {} rows, {} feature columns, churn rate {:.3}",
            dataset.len(),
            dataset.features.n_cols(),
            dataset.positive_rate()
        );
        Ok(dataset)
    }

    /// Parse an already-open CSV reader (header row required).
    pub fn read<R: io::Read>(&self, mut reader: csv::Reader<R>) -> Result<Dataset> {
        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();

        let target_idx = headers
            .iter()
            .position(|h| *h == self.target)
            .ok_or_else(|| anyhow!("target column '{}' not found in header", self.target))?;

        // One Vec<String> of raw cells per column
        let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        for (line, record) in reader.records().enumerate() {
            let record = record.with_context(|| format!("Malformed CSV row {}", line + 2))?;
            for (col, value) in record.iter().enumerate() {
                cells[col].push(value.trim().to_string());
            }
        }

        let target = cells[target_idx]
            .iter()
            .enumerate()
            .map(|(row, v)| parse_label(v).with_context(|| format!("Bad target at row {}", row + 2)))
            .collect::<Result<Vec<u8>>>()?;

        let mut features = Frame::new();
        for (idx, (name, values)) in headers.iter().zip(cells).enumerate() {
            if idx == target_idx || self.drop.contains(name) {
                continue;
            }
            features.push_column(name.clone(), infer_column(values))?;
        }

        if features.n_cols() == 0 {
            bail!("dataset has no feature columns");
        }
        Ok(Dataset { features, target })
    }
}

fn parse_label(value: &str) -> Result<u8> {
    match value.parse::<f64>() {
        Ok(v) if v == 0.0 => Ok(0),
        Ok(v) if v == 1.0 => Ok(1),
        _ => bail!("target must be 0 or 1, got '{value}'"),
    }
}

/// Numeric when every cell parses as f64, categorical otherwise.
fn infer_column(values: Vec<String>) -> Column {
    let parsed: Option<Vec<f64>> = values.iter().map(|v| v.parse::<f64>().ok()).collect();
    match parsed {
        Some(nums) if !values.is_empty() => Column::Numeric(nums),
        _ => Column::Categorical(values),
    }
}
