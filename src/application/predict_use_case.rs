// ============================================================
// Layer 2 — PredictionService
// ============================================================
// Scores a batch of customer records against the cached model.
//
//   Step 1: Validate every record, normalise Gender    (Layer 3)
//   Step 2: Get the cached artifact, loading if needed  (Layer 6)
//   Step 3: Build a frame in training column order      (Layer 4)
//   Step 4: predict_proba on a blocking thread          (Layer 5)
//   Step 5: Threshold at 0.5, round to 4 decimals       (Layer 3)
//
// Validation runs before the model is touched, so a bad request
// is rejected even when no model is available. An empty batch
// returns empty arrays without loading anything.

use std::sync::Arc;
use thiserror::Error;

use crate::data::frame::Frame;
use crate::domain::customer::{validate_batch, CustomerRecord, ValidationError};
use crate::domain::prediction::PredictionResult;
use crate::infra::{
    metrics,
    model_cache::{LoadError, ModelLoader},
};

#[derive(Debug, Error)]
pub enum PredictError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("{0}")]
    Load(#[from] LoadError),

    #[error("inference failed: {0:#}")]
    Inference(anyhow::Error),
}

#[derive(Clone)]
pub struct PredictionService {
    loader: Arc<ModelLoader>,
}

impl PredictionService {
    pub fn new(loader: ModelLoader) -> Self {
        Self { loader: Arc::new(loader) }
    }

    pub fn loader(&self) -> &ModelLoader {
        &self.loader
    }

    pub async fn predict(&self, records: Vec<CustomerRecord>) -> Result<PredictionResult, PredictError> {
        // ── Step 1: Validate ─────────────────────────────────────────────────
        let records = validate_batch(records)?;
        if records.is_empty() {
            return Ok(PredictionResult::from_probabilities(&[]));
        }

        // ── Step 2: Model ────────────────────────────────────────────────────
        let artifact = self.loader.get().await?;

        // ── Steps 3–4: Frame + inference ─────────────────────────────────────
        let proba = tokio::task::spawn_blocking(move || {
            let frame = Frame::from_customers(&records);
            artifact.predict_proba(&frame)
        })
        .await
        .map_err(|e| PredictError::Inference(anyhow::anyhow!("inference task failed: {e}")))?
        .map_err(PredictError::Inference)?;

        // ── Step 5: Result ───────────────────────────────────────────────────
        let result = PredictionResult::from_probabilities(&proba.to_vec());
        let churned = result.churn_count();
        metrics::record_predictions(churned, result.len() - churned);
        tracing::debug!("Scored {} customers, {} predicted to churn", result.len(), churned);
        Ok(result)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fitted_artifact, sample_customer};

    fn service() -> PredictionService {
        PredictionService::new(ModelLoader::preloaded("unused.bin", fitted_artifact()))
    }

    #[tokio::test]
    async fn test_predict_one() {
        let result = service().predict(vec![sample_customer()]).await.unwrap();
        assert_eq!(result.len(), 1);
        assert!(result.predictions[0] <= 1);
        assert!((0.0..=1.0).contains(&result.probabilities[0]));
    }

    #[tokio::test]
    async fn test_gender_case_does_not_matter() {
        let svc = service();
        let mut lower = sample_customer();
        lower.gender = "female".to_string();
        let a = svc.predict(vec![sample_customer()]).await.unwrap();
        let b = svc.predict(vec![lower]).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_empty_batch_skips_model() {
        let svc = PredictionService::new(ModelLoader::new("/missing/model.bin"));
        let result = svc.predict(Vec::new()).await.unwrap();
        assert!(result.predictions.is_empty());
        assert!(!svc.loader().is_loaded());
    }

    #[tokio::test]
    async fn test_validation_before_load() {
        let svc = PredictionService::new(ModelLoader::new("/missing/model.bin"));
        let mut bad = sample_customer();
        bad.age = 10;
        assert!(matches!(svc.predict(vec![bad]).await, Err(PredictError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_missing_model_is_load_error() {
        let svc = PredictionService::new(ModelLoader::new("/missing/model.bin"));
        let err = svc.predict(vec![sample_customer()]).await.unwrap_err();
        assert!(matches!(err, PredictError::Load(LoadError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_output_order_matches_input() {
        let svc = service();
        let mut young = sample_customer();
        young.age = 20;
        let batch = svc.predict(vec![sample_customer(), young.clone()]).await.unwrap();
        let single = svc.predict(vec![young]).await.unwrap();
        assert_eq!(batch.probabilities[1], single.probabilities[0]);
    }
}
