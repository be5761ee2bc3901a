// ============================================================
// Layer 5 — Preprocessing + Model Pipeline
// ============================================================
// Composes the ColumnTransformer and a ModelSpec into one unit:
//
//   fit:     Frame ──► preprocessor.fit ──► transform ──► model.fit
//   predict: Frame ──► (frozen) transform ──► model.predict_proba
//
// The fitted pipeline is the only carrier of scaling statistics,
// category sets and model weights, so whatever was learned at
// training time is exactly what runs at serving time.

use anyhow::{bail, Context, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::data::frame::Frame;
use crate::data::preprocessor::{ColumnTransformer, FittedColumnTransformer};
use crate::ml::model::{ModelSpec, TrainedModel};
use crate::ml::Classifier;

#[derive(Debug, Clone)]
pub struct Pipeline {
    preprocessor: ColumnTransformer,
    model:        ModelSpec,
}

impl Pipeline {
    pub fn new(preprocessor: ColumnTransformer, model: ModelSpec) -> Self {
        Self { preprocessor, model }
    }

    pub fn fit(&self, frame: &Frame, y: &[u8]) -> Result<FittedPipeline> {
        if frame.n_rows() != y.len() {
            bail!("pipeline got {} rows but {} labels", frame.n_rows(), y.len());
        }
        let preprocessor = self
            .preprocessor
            .fit(frame)
            .context("Failed to fit preprocessor")?;
        let x = preprocessor.transform(frame)?;

        tracing::info!(
            "Fitting {} on {} rows × {} features",
            self.model.kind(),
            x.nrows(),
            x.ncols()
        );
        let model = self.model.fit(x.view(), y).context("Failed to fit model")?;

        Ok(FittedPipeline { preprocessor, model })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPipeline {
    preprocessor: FittedColumnTransformer,
    model:        TrainedModel,
}

impl FittedPipeline {
    pub fn preprocessor(&self) -> &FittedColumnTransformer {
        &self.preprocessor
    }

    pub fn model(&self) -> &TrainedModel {
        &self.model
    }

    pub fn transform(&self, frame: &Frame) -> Result<Array2<f64>> {
        self.preprocessor.transform(frame)
    }

    /// Churn probability per row.
    pub fn predict_proba(&self, frame: &Frame) -> Result<Array1<f64>> {
        let x = self.transform(frame)?;
        Ok(self.model.predict_proba(x.view()))
    }
}
