// ============================================================
// Layer 5 — ML / Model Layer
// ============================================================
// All classifier code lives here. Burn is used only by the
// logistic regression trainer; the tree ensembles are plain
// ndarray + rayon.
//
//   tree.rs       — CART regression tree shared by all ensembles
//   forest.rs     — random forest and extra trees
//   boosting.rs   — gradient boosting with log-loss
//   logistic.rs   — L2 logistic regression trained with Burn/Adam
//   model.rs      — model factory (token → ModelSpec) and the
//                   serializable TrainedModel enum
//   pipeline.rs   — preprocessor + model as one fit/predict unit
//   evaluation.rs — accuracy, F1, ROC-AUC

use ndarray::{Array1, ArrayView2};

/// CART tree used by every ensemble
pub mod tree;

/// Bagged tree ensembles
pub mod forest;

/// Gradient boosted trees
pub mod boosting;

/// Logistic regression
pub mod logistic;

/// Model factory and trained-model enum
pub mod model;

/// Fitted preprocessing + model pipeline
pub mod pipeline;

/// Classification metrics
pub mod evaluation;

/// A fitted binary classifier over a dense feature matrix.
pub trait Classifier {
    /// Churn probability for every row of `x`.
    fn predict_proba(&self, x: ArrayView2<f64>) -> Array1<f64>;
}
