use serde::{Deserialize, Serialize};

/// Probability at or above which a customer is labelled as churning.
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Hard 0/1 churn label for one probability.
pub fn label(p: f64) -> u8 {
    u8::from(p >= DECISION_THRESHOLD)
}

/// Response body of `POST /predict`: one label and one probability
/// per input record, in input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub predictions:   Vec<u8>,
    pub probabilities: Vec<f64>,
}

impl PredictionResult {
    /// Threshold raw churn probabilities and round them to 4 decimals.
    /// The label is computed from the unrounded probability.
    pub fn from_probabilities(probabilities: &[f64]) -> Self {
        let predictions = probabilities.iter().map(|&p| label(p)).collect();
        let probabilities = probabilities.iter().map(|&p| round4(p)).collect();
        Self { predictions, probabilities }
    }

    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    pub fn churn_count(&self) -> usize {
        self.predictions.iter().filter(|&&p| p == 1).count()
    }
}

fn round4(p: f64) -> f64 {
    (p * 10_000.0).round_ties_even() / 10_000.0
}
