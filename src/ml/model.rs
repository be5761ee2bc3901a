// ============================================================
// Layer 5 — Model Factory
// ============================================================
// Maps a short model token to an untrained ModelSpec:
//
//   "rf" → RandomForest        "et" → ExtraTrees
//   "gb" → GradientBoosting    "lr" → LogisticRegression
//
// Hyperparameter overrides arrive as a name → JSON value map.
// They are laid over the family's defaults and deserialized
// into the family's typed params struct, so an unknown name or
// a value of the wrong type is rejected before anything trains.
//
// Fitting a ModelSpec yields a TrainedModel: one serializable
// enum over every fitted family, stored inside the artifact.

use anyhow::Result;
use ndarray::{Array1, ArrayView2};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::{collections::BTreeMap, fmt, str::FromStr};
use thiserror::Error;

use crate::ml::boosting::{BoostingModel, BoostingParams};
use crate::ml::forest::{ForestModel, ForestParams};
use crate::ml::logistic::{LogisticModel, LogisticParams};
use crate::ml::tree::Splitter;
use crate::ml::Classifier;

/// Hyperparameter overrides, name → JSON value.
pub type HyperParams = BTreeMap<String, Value>;

#[derive(Debug, Error, PartialEq)]
pub enum FactoryError {
    #[error("unknown model name: '{0}'")]
    UnknownModel(String),

    #[error("invalid hyperparameters for '{model}': {message}")]
    InvalidParams { model: ModelKind, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    RandomForest,
    GradientBoosting,
    ExtraTrees,
    LogisticRegression,
}

impl ModelKind {
    pub const ALL: [ModelKind; 4] = [
        ModelKind::RandomForest,
        ModelKind::GradientBoosting,
        ModelKind::ExtraTrees,
        ModelKind::LogisticRegression,
    ];

    /// CLI / tracker token.
    pub fn token(self) -> &'static str {
        match self {
            ModelKind::RandomForest       => "rf",
            ModelKind::GradientBoosting   => "gb",
            ModelKind::ExtraTrees         => "et",
            ModelKind::LogisticRegression => "lr",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for ModelKind {
    type Err = FactoryError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ModelKind::ALL
            .into_iter()
            .find(|k| k.token() == s)
            .ok_or_else(|| FactoryError::UnknownModel(s.to_string()))
    }
}

/// An untrained classifier with its effective hyperparameters.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelSpec {
    RandomForest(ForestParams),
    GradientBoosting(BoostingParams),
    ExtraTrees(ForestParams),
    LogisticRegression(LogisticParams),
}

/// Instantiate the model named by `name` with `overrides` applied.
pub fn get_model(name: &str, overrides: &HyperParams) -> std::result::Result<ModelSpec, FactoryError> {
    let kind: ModelKind = name.parse()?;
    ModelSpec::new(kind, overrides)
}

impl ModelSpec {
    pub fn new(kind: ModelKind, overrides: &HyperParams) -> std::result::Result<Self, FactoryError> {
        let spec = match kind {
            ModelKind::RandomForest => {
                let p = merge(kind, ForestParams::random_forest(), overrides)?;
                check(kind, p.validate())?;
                ModelSpec::RandomForest(p)
            }
            ModelKind::ExtraTrees => {
                let p = merge(kind, ForestParams::extra_trees(), overrides)?;
                check(kind, p.validate())?;
                ModelSpec::ExtraTrees(p)
            }
            ModelKind::GradientBoosting => {
                let p = merge(kind, BoostingParams::default(), overrides)?;
                check(kind, p.validate())?;
                ModelSpec::GradientBoosting(p)
            }
            ModelKind::LogisticRegression => {
                let p = merge(kind, LogisticParams::default(), overrides)?;
                check(kind, p.validate())?;
                ModelSpec::LogisticRegression(p)
            }
        };
        Ok(spec)
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            ModelSpec::RandomForest(_)       => ModelKind::RandomForest,
            ModelSpec::GradientBoosting(_)   => ModelKind::GradientBoosting,
            ModelSpec::ExtraTrees(_)         => ModelKind::ExtraTrees,
            ModelSpec::LogisticRegression(_) => ModelKind::LogisticRegression,
        }
    }

    /// Effective hyperparameters as strings, for the experiment tracker.
    /// `null` renders as `None`.
    pub fn params(&self) -> BTreeMap<String, String> {
        let value = match self {
            ModelSpec::RandomForest(p) | ModelSpec::ExtraTrees(p) => serde_json::to_value(p),
            ModelSpec::GradientBoosting(p)                         => serde_json::to_value(p),
            ModelSpec::LogisticRegression(p)                       => serde_json::to_value(p),
        };
        match value {
            Ok(Value::Object(map)) => map
                .into_iter()
                .map(|(k, v)| {
                    let s = match v {
                        Value::Null      => "None".to_string(),
                        Value::String(s) => s,
                        other            => other.to_string(),
                    };
                    (k, s)
                })
                .collect(),
            _ => BTreeMap::new(),
        }
    }

    /// Train on a preprocessed matrix.
    pub fn fit(&self, x: ArrayView2<f64>, y: &[u8]) -> Result<TrainedModel> {
        let model = match self {
            ModelSpec::RandomForest(p) => {
                TrainedModel::RandomForest(ForestModel::fit(p, Splitter::Best, x, y)?)
            }
            ModelSpec::ExtraTrees(p) => {
                TrainedModel::ExtraTrees(ForestModel::fit(p, Splitter::Random, x, y)?)
            }
            ModelSpec::GradientBoosting(p) => {
                TrainedModel::GradientBoosting(BoostingModel::fit(p, x, y)?)
            }
            ModelSpec::LogisticRegression(p) => {
                TrainedModel::LogisticRegression(LogisticModel::fit(p, x, y)?)
            }
        };
        tracing::info!("Fitted {}: {}", model.kind(), model.summary());
        Ok(model)
    }
}

fn check(kind: ModelKind, result: std::result::Result<(), String>) -> std::result::Result<(), FactoryError> {
    result.map_err(|message| FactoryError::InvalidParams { model: kind, message })
}

/// Lay `overrides` over `defaults` and read the result back as `P`.
fn merge<P>(kind: ModelKind, defaults: P, overrides: &HyperParams) -> std::result::Result<P, FactoryError>
where
    P: Serialize + DeserializeOwned,
{
    let invalid = |message: String| FactoryError::InvalidParams { model: kind, message };

    let base = match serde_json::to_value(&defaults) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => return Err(invalid("defaults are not a parameter map".into())),
    };

    let with = |key: &str, value: &Value| {
        let mut map = base.clone();
        map.insert(key.to_string(), value.clone());
        serde_json::from_value::<P>(Value::Object(map))
    };

    // One key at a time first, so the error can name the parameter.
    for (key, value) in overrides {
        if let Err(e) = with(key, value) {
            return Err(invalid(format!("parameter '{key}': {e}")));
        }
    }

    let mut merged = base.clone();
    merged.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    serde_json::from_value(Value::Object(merged)).map_err(|e| invalid(e.to_string()))
}

/// Every fitted model family, as stored in the artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrainedModel {
    RandomForest(ForestModel),
    GradientBoosting(BoostingModel),
    ExtraTrees(ForestModel),
    LogisticRegression(LogisticModel),
}

impl TrainedModel {
    pub fn kind(&self) -> ModelKind {
        match self {
            TrainedModel::RandomForest(_)       => ModelKind::RandomForest,
            TrainedModel::GradientBoosting(_)   => ModelKind::GradientBoosting,
            TrainedModel::ExtraTrees(_)         => ModelKind::ExtraTrees,
            TrainedModel::LogisticRegression(_) => ModelKind::LogisticRegression,
        }
    }

    /// Size of the fitted model, for logs.
    pub fn summary(&self) -> String {
        match self {
            TrainedModel::RandomForest(m) | TrainedModel::ExtraTrees(m) => format!(
                "{} trees over {} features, {} leaves, max depth {}",
                m.n_trees(),
                m.n_features(),
                m.n_leaves(),
                m.max_depth()
            ),
            TrainedModel::GradientBoosting(m) => format!("{} boosting stages", m.n_stages()),
            TrainedModel::LogisticRegression(m) => format!(
                "{} weights, intercept {:.4}, {} iterations",
                m.weights().len(),
                m.intercept(),
                m.n_iter()
            ),
        }
    }
}

impl Classifier for TrainedModel {
    fn predict_proba(&self, x: ArrayView2<f64>) -> Array1<f64> {
        match self {
            TrainedModel::RandomForest(m) | TrainedModel::ExtraTrees(m) => m.predict_proba(x),
            TrainedModel::GradientBoosting(m)                           => m.predict_proba(x),
            TrainedModel::LogisticRegression(m)                         => m.predict_proba(x),
        }
    }
}
