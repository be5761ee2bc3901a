// ============================================================
// Layer 5 — Random Forest / Extra Trees
// ============================================================
// Bagged ensembles of RegressionTrees fitted on the 0/1 churn
// label. A forest's churn probability is the mean of its trees'
// leaf values (each leaf value is a churn fraction).
//
//   random forest: bootstrap rows + exhaustive thresholds
//   extra trees:   all rows + one random threshold per feature
//
// Trees are independent, so they are fitted in parallel with
// rayon. Tree `i` draws from StdRng::seed_from_u64(seed + i);
// a fixed `random_state` therefore gives the same forest no
// matter how many threads run it.

use anyhow::{bail, Context, Result};
use ndarray::{Array1, ArrayView2};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::ml::tree::{RegressionTree, Splitter, TreeParams};
use crate::ml::Classifier;

/// Number of features examined per split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaxFeatures {
    Count(usize),
    Fraction(f64),
    Named(MaxFeaturesRule),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaxFeaturesRule {
    Sqrt,
    Log2,
}

impl MaxFeatures {
    /// Resolve to a count in `1..=n_features`.
    pub fn resolve(rule: Option<&MaxFeatures>, n_features: usize) -> usize {
        let n = n_features as f64;
        let k = match rule {
            None                                        => n_features,
            Some(MaxFeatures::Count(k))                 => *k,
            Some(MaxFeatures::Fraction(f))              => (f * n).floor() as usize,
            Some(MaxFeatures::Named(MaxFeaturesRule::Sqrt)) => n.sqrt().floor() as usize,
            Some(MaxFeatures::Named(MaxFeaturesRule::Log2)) => n.log2().floor() as usize,
        };
        k.clamp(1, n_features.max(1))
    }
}

impl std::fmt::Display for MaxFeatures {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaxFeatures::Count(k)                         => write!(f, "{k}"),
            MaxFeatures::Fraction(x)                      => write!(f, "{x}"),
            MaxFeatures::Named(MaxFeaturesRule::Sqrt)     => write!(f, "sqrt"),
            MaxFeatures::Named(MaxFeaturesRule::Log2)     => write!(f, "log2"),
        }
    }
}

/// Hyperparameters shared by random forest and extra trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForestParams {
    pub n_estimators:      usize,
    pub max_depth:         Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf:  usize,
    pub max_features:      Option<MaxFeatures>,
    pub bootstrap:         bool,
    pub random_state:      Option<u64>,
    pub n_jobs:            Option<i64>,
}

impl ForestParams {
    pub fn random_forest() -> Self {
        Self {
            n_estimators:      100,
            max_depth:         None,
            min_samples_split: 2,
            min_samples_leaf:  1,
            max_features:      Some(MaxFeatures::Named(MaxFeaturesRule::Sqrt)),
            bootstrap:         true,
            random_state:      None,
            n_jobs:            None,
        }
    }

    pub fn extra_trees() -> Self {
        Self { bootstrap: false, ..Self::random_forest() }
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.n_estimators == 0 {
            return Err("n_estimators must be >= 1".into());
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
        match &self.max_features {
            Some(MaxFeatures::Count(0)) => return Err("max_features must be >= 1".into()),
            Some(MaxFeatures::Fraction(f)) if !(*f > 0.0 && *f <= 1.0) => {
                return Err("max_features fraction must be in (0, 1]".into())
            }
            _ => {}
        }
        if self.n_jobs == Some(0) {
            return Err("n_jobs must not be 0".into());
        }
        Ok(())
    }
}

/// A fitted forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestModel {
    trees:      Vec<RegressionTree>,
    n_features: usize,
}

impl ForestModel {
    pub fn fit(
        params:   &ForestParams,
        splitter: Splitter,
        x:        ArrayView2<f64>,
        y:        &[u8],
    ) -> Result<Self> {
        if let Err(msg) = params.validate() {
            bail!("invalid forest parameters: {msg}");
        }
        let n_rows = x.nrows();
        if n_rows == 0 || n_rows != y.len() {
            bail!("forest needs matching non-empty x/y, got {n_rows} rows and {} labels", y.len());
        }

        let target: Vec<f64> = y.iter().map(|&v| f64::from(v)).collect();
        let tree_params = TreeParams {
            max_depth:         params.max_depth,
            min_samples_split: params.min_samples_split,
            min_samples_leaf:  params.min_samples_leaf,
            max_features:      MaxFeatures::resolve(params.max_features.as_ref(), x.ncols()),
            splitter,
        };
        let seed = params.random_state.unwrap_or_else(rand::random);
        let bootstrap = params.bootstrap;

        tracing::info!(
            "Fitting {} trees ({:?} splitter, {} of {} features per split, bootstrap={})",
            params.n_estimators,
            splitter,
            tree_params.max_features,
            x.ncols(),
            bootstrap
        );

        let fit_one = |i: usize| -> RegressionTree {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(i as u64));
            let rows: Vec<usize> = if bootstrap {
                (0..n_rows).map(|_| rng.gen_range(0..n_rows)).collect()
            } else {
                (0..n_rows).collect()
            };
            RegressionTree::fit(x, &target, rows, &tree_params, &mut rng)
        };

        let trees: Vec<RegressionTree> = match params.n_jobs {
            Some(1) => (0..params.n_estimators).map(&fit_one).collect(),
            Some(k) if k > 1 => rayon::ThreadPoolBuilder::new()
                .num_threads(k as usize)
                .build()
                .context("Cannot build rayon thread pool")?
                .install(|| (0..params.n_estimators).into_par_iter().map(&fit_one).collect()),
            // None or -1: the global pool, one worker per core
            _ => (0..params.n_estimators).into_par_iter().map(&fit_one).collect(),
        };

        Ok(Self { trees, n_features: x.ncols() })
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_leaves(&self) -> usize {
        self.trees.iter().map(RegressionTree::n_leaves).sum()
    }

    pub fn max_depth(&self) -> usize {
        self.trees.iter().map(RegressionTree::depth).max().unwrap_or(0)
    }
}

impl Classifier for ForestModel {
    fn predict_proba(&self, x: ArrayView2<f64>) -> Array1<f64> {
        let n_trees = self.trees.len().max(1) as f64;
        x.outer_iter()
            .map(|row| {
                let row = row.to_vec();
                self.trees.iter().map(|t| t.predict_row(&row)).sum::<f64>() / n_trees
            })
            .collect()
    }
}
