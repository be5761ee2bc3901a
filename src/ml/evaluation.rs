// ============================================================
// Layer 5 — Evaluation Metrics
// ============================================================
// Test-split metrics logged for every training run:
//
//   accuracy = correct / n
//   f1       = 2·TP / (2·TP + FP + FN)       (positive class = 1)
//   roc_auc  = Mann–Whitney U / (n_pos · n_neg), ties get average ranks
//
// ROC-AUC is undefined when the labels contain a single class;
// that case is an error rather than a silent 0.5.

use anyhow::{bail, Result};
use std::collections::BTreeMap;

pub fn accuracy(y_true: &[u8], y_pred: &[u8]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    correct as f64 / y_true.len() as f64
}

/// F1 of the positive class. Zero when there are no true positives.
pub fn f1_score(y_true: &[u8], y_pred: &[u8]) -> f64 {
    let (mut tp, mut fp, mut fn_) = (0usize, 0usize, 0usize);
    for (&t, &p) in y_true.iter().zip(y_pred) {
        match (t, p) {
            (1, 1) => tp += 1,
            (0, 1) => fp += 1,
            (1, 0) => fn_ += 1,
            _ => {}
        }
    }
    let denom = 2 * tp + fp + fn_;
    if denom == 0 {
        0.0
    } else {
        2.0 * tp as f64 / denom as f64
    }
}

pub fn roc_auc(y_true: &[u8], scores: &[f64]) -> Result<f64> {
    if y_true.len() != scores.len() {
        bail!("roc_auc: {} labels but {} scores", y_true.len(), scores.len());
    }
    let n_pos = y_true.iter().filter(|&&y| y == 1).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        bail!("roc_auc is undefined when only one class is present");
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    // 1-based ranks, averaged over runs of equal scores
    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg;
        }
        i = j + 1;
    }

    let pos_rank_sum: f64 = y_true
        .iter()
        .zip(&ranks)
        .filter(|(y, _)| **y == 1)
        .map(|(_, r)| *r)
        .sum();
    let u = pos_rank_sum - (n_pos * (n_pos + 1)) as f64 / 2.0;
    Ok(u / (n_pos * n_neg) as f64)
}

/// Test-split metrics of one trained model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluationReport {
    pub accuracy: f64,
    pub f1:       f64,
    pub roc_auc:  f64,
}

impl EvaluationReport {
    pub fn compute(y_true: &[u8], y_pred: &[u8], proba: &[f64]) -> Result<Self> {
        Ok(Self {
            accuracy: accuracy(y_true, y_pred),
            f1:       f1_score(y_true, y_pred),
            roc_auc:  roc_auc(y_true, proba)?,
        })
    }

    /// Metric name → value, as logged to the tracker.
    pub fn as_map(&self) -> BTreeMap<String, f64> {
        BTreeMap::from([
            ("accuracy".to_string(), self.accuracy),
            ("f1".to_string(), self.f1),
            ("roc_auc".to_string(), self.roc_auc),
        ])
    }

    /// `  RF  AUC 0.861  ACC 0.866  F1  0.590`
    pub fn summary(&self, model_token: &str) -> String {
        format!(
            "  {}  AUC {:.3}  ACC {:.3}  F1  {:.3}",
            model_token.to_uppercase(),
            self.roc_auc,
            self.accuracy,
            self.f1
        )
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accuracy_and_f1() {
        let y_true = [1, 0, 1, 1, 0, 0];
        let y_pred = [1, 0, 0, 1, 1, 0];
        assert!((accuracy(&y_true, &y_pred) - 4.0 / 6.0).abs() < 1e-12);
        // tp=2 fp=1 fn=1 → 4/6
        assert!((f1_score(&y_true, &y_pred) - 4.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_f1_without_positives() {
        assert_eq!(f1_score(&[0, 0], &[0, 0]), 0.0);
    }

    #[test]
    fn test_auc_perfect_and_inverted() {
        let y = [0, 0, 1, 1];
        assert_eq!(roc_auc(&y, &[0.1, 0.2, 0.8, 0.9]).unwrap(), 1.0);
        assert_eq!(roc_auc(&y, &[0.9, 0.8, 0.2, 0.1]).unwrap(), 0.0);
    }

    #[test]
    fn test_auc_with_ties() {
        // classic example: 0.75
        let y = [0, 0, 1, 1];
        let s = [0.1, 0.4, 0.35, 0.8];
        assert!((roc_auc(&y, &s).unwrap() - 0.75).abs() < 1e-12);
        // all scores tied → 0.5
        assert!((roc_auc(&y, &[0.5; 4]).unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_auc_single_class_is_error() {
        assert!(roc_auc(&[1, 1], &[0.2, 0.7]).is_err());
    }

    #[test]
    fn test_summary_format() {
        let r = EvaluationReport { accuracy: 0.8661, f1: 0.59, roc_auc: 0.8612 };
        assert_eq!(r.summary("rf"), "  RF  AUC 0.861  ACC 0.866  F1  0.590");
        assert_eq!(r.as_map().len(), 3);
    }
}
