// ============================================================
// Layer 5 — Gradient Boosting (binary log-loss)
// ============================================================
// Additive model in log-odds space:
//
//   F_0(x) = ln(p / (1 - p))          p = training churn rate
//   F_m(x) = F_{m-1}(x) + η · h_m(x)
//   P(churn | x) = σ(F_M(x))
//
// Each stage fits a RegressionTree to the residuals y - σ(F)
// on a (sub)sample of rows, then replaces every leaf value with
// the Newton step Σ residual / Σ p(1 - p) over the rows in that
// leaf. Stages are inherently sequential.

use anyhow::{bail, Result};
use ndarray::{Array1, ArrayView2};
use rand::{rngs::StdRng, seq::index, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::ml::forest::MaxFeatures;
use crate::ml::tree::{RegressionTree, Splitter, TreeParams};
use crate::ml::Classifier;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoostingParams {
    pub n_estimators:      usize,
    pub learning_rate:     f64,
    pub max_depth:         Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf:  usize,
    pub subsample:         f64,
    pub max_features:      Option<MaxFeatures>,
    pub random_state:      Option<u64>,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_estimators:      100,
            learning_rate:     0.1,
            max_depth:         Some(3),
            min_samples_split: 2,
            min_samples_leaf:  1,
            subsample:         1.0,
            max_features:      None,
            random_state:      None,
        }
    }
}

impl BoostingParams {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.n_estimators == 0 {
            return Err("n_estimators must be >= 1".into());
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err("learning_rate must be > 0".into());
        }
        if self.max_depth == Some(0) {
            return Err("max_depth must be >= 1 or null".into());
        }
        if self.min_samples_split < 2 {
            return Err("min_samples_split must be >= 2".into());
        }
        if self.min_samples_leaf == 0 {
            return Err("min_samples_leaf must be >= 1".into());
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err("subsample must be in (0, 1]".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostingModel {
    init_score:    f64,
    learning_rate: f64,
    trees:         Vec<RegressionTree>,
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

// Keeps the initial log-odds finite for single-class targets.
const PROBA_EPS: f64 = 1e-15;

impl BoostingModel {
    pub fn fit(params: &BoostingParams, x: ArrayView2<f64>, y: &[u8]) -> Result<Self> {
        if let Err(msg) = params.validate() {
            bail!("invalid boosting parameters: {msg}");
        }
        let n = x.nrows();
        if n == 0 || n != y.len() {
            bail!("boosting needs matching non-empty x/y, got {n} rows and {} labels", y.len());
        }

        let target: Vec<f64> = y.iter().map(|&v| f64::from(v)).collect();
        let prior = (target.iter().sum::<f64>() / n as f64).clamp(PROBA_EPS, 1.0 - PROBA_EPS);
        let init_score = (prior / (1.0 - prior)).ln();

        let tree_params = TreeParams {
            max_depth:         params.max_depth,
            min_samples_split: params.min_samples_split,
            min_samples_leaf:  params.min_samples_leaf,
            max_features:      MaxFeatures::resolve(params.max_features.as_ref(), x.ncols()),
            splitter:          Splitter::Best,
        };
        let mut rng = StdRng::seed_from_u64(params.random_state.unwrap_or_else(rand::random));
        let n_sub = ((params.subsample * n as f64) as usize).max(1);

        tracing::info!(
            "Boosting {} stages (learning_rate={}, max_depth={:?}, subsample={})",
            params.n_estimators,
            params.learning_rate,
            params.max_depth,
            params.subsample
        );

        let rows_of = |x_row: usize| -> Vec<f64> { x.row(x_row).to_vec() };
        let mut raw = vec![init_score; n];
        let mut trees = Vec::with_capacity(params.n_estimators);

        for stage in 0..params.n_estimators {
            let proba: Vec<f64> = raw.iter().map(|&f| sigmoid(f)).collect();
            let residual: Vec<f64> = target.iter().zip(&proba).map(|(y, p)| y - p).collect();

            let rows: Vec<usize> = if n_sub < n {
                let mut r = index::sample(&mut rng, n, n_sub).into_vec();
                r.sort_unstable();
                r
            } else {
                (0..n).collect()
            };

            let mut tree = RegressionTree::fit(x, &residual, rows.clone(), &tree_params, &mut rng);

            // Newton step per leaf: Σ r / Σ p(1 - p)
            let mut sums: HashMap<usize, (f64, f64)> = HashMap::new();
            for &r in &rows {
                let leaf = tree.leaf_of(&rows_of(r));
                let entry = sums.entry(leaf).or_insert((0.0, 0.0));
                entry.0 += residual[r];
                entry.1 += proba[r] * (1.0 - proba[r]);
            }
            for (leaf, (num, den)) in sums {
                let step = if den.abs() < 1e-150 { 0.0 } else { num / den };
                tree.set_leaf_value(leaf, step);
            }

            for (i, f) in raw.iter_mut().enumerate() {
                *f += params.learning_rate * tree.predict_row(&rows_of(i));
            }
            trees.push(tree);

            if (stage + 1) % 25 == 0 {
                tracing::debug!("Boosting stage {}/{}", stage + 1, params.n_estimators);
            }
        }

        Ok(Self { init_score, learning_rate: params.learning_rate, trees })
    }

    pub fn n_stages(&self) -> usize {
        self.trees.len()
    }

    /// Log-odds before the sigmoid.
    pub fn decision_function(&self, x: ArrayView2<f64>) -> Array1<f64> {
        x.outer_iter()
            .map(|row| {
                let row = row.to_vec();
                self.init_score
                    + self.learning_rate * self.trees.iter().map(|t| t.predict_row(&row)).sum::<f64>()
            })
            .collect()
    }
}

impl Classifier for BoostingModel {
    fn predict_proba(&self, x: ArrayView2<f64>) -> Array1<f64> {
        self.decision_function(x).mapv(sigmoid)
    }
}
