// ============================================================
// Layer 5 — Logistic Regression (Burn)
// ============================================================
// L2-regularised logistic regression trained with full-batch
// Adam on Burn's NdArray backend.
//
// Objective (the usual C-parameterised one, divided by C·n):
//
//   mean_i [ log(1 + e^{z_i}) - y_i z_i ]  +  ||w||² / (2 C n)
//
// with z = X·w + b. The intercept is not penalised. The
// softplus term is written in its overflow-safe form
//   max(z, 0) + log1p(e^{-|z|})
//
// Training stops after `max_iter` steps or once the objective
// changes by less than `tol` (relative) between steps. The
// learned weights are exported into a plain LogisticModel so
// inference needs no Burn tensors at all.

use anyhow::{anyhow, bail, Result};
use burn::{
    nn::{Initializer, Linear, LinearConfig},
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
};
use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::ml::Classifier;

type TrainBackend = burn::backend::Autodiff<burn::backend::NdArray>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogisticParams {
    /// Inverse regularisation strength.
    #[serde(rename = "C")]
    pub c:             f64,
    pub max_iter:      usize,
    pub tol:           f64,
    /// Adam step size.
    pub learning_rate: f64,
    /// Accepted for interface parity; full-batch training runs on one thread.
    pub n_jobs:        Option<i64>,
}

impl Default for LogisticParams {
    fn default() -> Self {
        Self {
            c:             1.0,
            max_iter:      1000,
            tol:           1e-4,
            learning_rate: 0.05,
            n_jobs:        Some(-1),
        }
    }
}

impl LogisticParams {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !(self.c > 0.0 && self.c.is_finite()) {
            return Err("C must be a positive number".into());
        }
        if self.max_iter == 0 {
            return Err("max_iter must be >= 1".into());
        }
        if !(self.tol >= 0.0) {
            return Err("tol must be >= 0".into());
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err("learning_rate must be > 0".into());
        }
        Ok(())
    }
}

// ─── Burn module ──────────────────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct LogisticNet<B: Backend> {
    linear: Linear<B>,
}

impl<B: Backend> LogisticNet<B> {
    pub fn new(n_features: usize, device: &B::Device) -> Self {
        let linear = LinearConfig::new(n_features, 1)
            .with_initializer(Initializer::Zeros)
            .init(device);
        Self { linear }
    }

    /// x: [n, d] → logits: [n, 1]
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        self.linear.forward(x)
    }

    /// Penalised mean log-loss.
    pub fn objective(&self, x: Tensor<B, 2>, y: Tensor<B, 2>, l2: f64) -> Tensor<B, 1> {
        let z = self.forward(x);
        let log_loss = (z.clone().clamp_min(0.0) - z.clone() * y + z.abs().neg().exp().log1p()).mean();
        let penalty = self.linear.weight.val().powf_scalar(2.0).sum().mul_scalar(l2);
        log_loss + penalty
    }
}

// ─── Fitted model ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    weights:   Vec<f64>,
    intercept: f64,
    n_iter:    usize,
}

impl LogisticModel {
    pub fn fit(params: &LogisticParams, x: ArrayView2<f64>, y: &[u8]) -> Result<Self> {
        if let Err(msg) = params.validate() {
            bail!("invalid logistic regression parameters: {msg}");
        }
        let (n, d) = x.dim();
        if n == 0 || n != y.len() {
            bail!("logistic regression needs matching non-empty x/y, got {n} rows and {} labels", y.len());
        }

        let device = Default::default();
        let xs: Vec<f32> = x.iter().map(|&v| v as f32).collect();
        let ys: Vec<f32> = y.iter().map(|&v| f32::from(v)).collect();
        let x_t = Tensor::<TrainBackend, 2>::from_data(TensorData::new(xs, [n, d]), &device);
        let y_t = Tensor::<TrainBackend, 2>::from_data(TensorData::new(ys, [n, 1]), &device);

        let l2 = 1.0 / (2.0 * params.c * n as f64);
        let mut model = LogisticNet::<TrainBackend>::new(d, &device);
        let mut optim = AdamConfig::new().init::<TrainBackend, LogisticNet<TrainBackend>>();

        tracing::info!(
            "Training logistic regression on {n}×{d} (C={}, max_iter={}, lr={})",
            params.c,
            params.max_iter,
            params.learning_rate
        );

        let mut previous = f64::INFINITY;
        let mut n_iter = 0;
        let mut converged = false;
        for iter in 1..=params.max_iter {
            let loss = model.objective(x_t.clone(), y_t.clone(), l2);
            let value: f64 = loss.clone().into_scalar().elem::<f64>();

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(params.learning_rate, model, grads);
            n_iter = iter;

            if (previous - value).abs() <= params.tol * previous.abs().max(1.0) {
                converged = true;
                break;
            }
            previous = value;
            if iter % 100 == 0 {
                tracing::debug!("iter {iter}: objective {value:.6}");
            }
        }
        if !converged {
            tracing::warn!("Logistic regression did not converge in {} iterations", params.max_iter);
        }

        let weights = model
            .linear
            .weight
            .val()
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| anyhow!("Cannot read trained weights: {e:?}"))?;
        let intercept = match &model.linear.bias {
            Some(bias) => bias
                .val()
                .into_data()
                .to_vec::<f32>()
                .map_err(|e| anyhow!("Cannot read trained bias: {e:?}"))?
                .first()
                .copied()
                .unwrap_or(0.0),
            None => 0.0,
        };

        Ok(Self {
            weights: weights.into_iter().map(f64::from).collect(),
            intercept: f64::from(intercept),
            n_iter,
        })
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn n_iter(&self) -> usize {
        self.n_iter
    }
}

impl Classifier for LogisticModel {
    fn predict_proba(&self, x: ArrayView2<f64>) -> Array1<f64> {
        let w = ArrayView1::from(&self.weights[..]);
        (x.dot(&w) + self.intercept).mapv(|z| 1.0 / (1.0 + (-z).exp()))
    }
}
