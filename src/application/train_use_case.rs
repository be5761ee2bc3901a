// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates one training run end to end:
//
//   Step 1: Load the churn CSV                 (Layer 4 - data)
//   Step 2: Stratified 80/20 split, seed 42    (Layer 4 - data)
//   Step 3: Build preprocessor from col types  (Layer 4 - data)
//   Step 4: Instantiate model from factory     (Layer 5 - ml)
//   Step 5: Open tracker run "{model}_run"     (Layer 6 - infra)
//   Step 6: Fit pipeline on the train split    (Layer 5 - ml)
//   Step 7: Evaluate on the test split         (Layer 5 - ml)
//   Step 8: Log params, metrics, artifact      (Layer 6 - infra)
//   Step 9: Export artifact for serving        (Layer 6 - infra)
//
// The factory runs before the tracker is touched, so a bad
// model token never leaves an empty run behind. If anything
// fails after the run is opened, the run is closed as FAILED
// (best effort) and the underlying error is returned.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::data::{
    frame::Frame,
    loader::CsvDatasetLoader,
    preprocessor::build_preprocessor,
    splitter::{stratified_split, take},
};
use crate::domain::prediction::label;
use crate::domain::traits::{ExperimentTracker, RunStatus, TrackedRun};
use crate::infra::{
    model_store::{ArtifactMetadata, ModelArtifact, ModelStore, DEFAULT_MODEL_PATH},
    tracking::{tracker_for, DEFAULT_EXPERIMENT, DEFAULT_TRACKING_URI},
};
use crate::ml::{
    evaluation::EvaluationReport,
    model::{get_model, HyperParams, ModelSpec},
    pipeline::Pipeline,
};

/// Path of the model artifact inside a tracked run.
pub const RUN_ARTIFACT_PATH: &str = "model/model.bin";

// ─── Training Configuration ──────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Model token: rf, gb, et or lr
    pub model:         String,
    /// Hyperparameter overrides applied on top of the family defaults
    pub params:        HyperParams,
    pub data_path:     String,
    /// Dataset label recorded as a tag and as the `Dataset` param
    pub dataset_name:  String,
    pub test_fraction: f64,
    pub seed:          u64,
    pub tracking_uri:  String,
    pub experiment:    String,
    /// Where the serving artifact is exported
    pub model_path:    String,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            model:         "rf".to_string(),
            params:        HyperParams::new(),
            data_path:     "dataset/Churn_Modelling.csv".to_string(),
            dataset_name:  "bank-churn.csv".to_string(),
            test_fraction: 0.2,
            seed:          42,
            tracking_uri:  DEFAULT_TRACKING_URI.to_string(),
            experiment:    DEFAULT_EXPERIMENT.to_string(),
            model_path:    DEFAULT_MODEL_PATH.to_string(),
        }
    }
}

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    pub model:      String,
    pub run_id:     String,
    pub report:     EvaluationReport,
    pub model_path: PathBuf,
}

impl TrainOutcome {
    pub fn summary(&self) -> String {
        self.report.summary(&self.model)
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config:  TrainConfig,
    tracker: Option<Box<dyn ExperimentTracker>>,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config, tracker: None }
    }

    /// Report to `tracker` instead of the one named by `tracking_uri`.
    #[cfg(test)]
    pub fn with_tracker(mut self, tracker: Box<dyn ExperimentTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn execute(&self) -> Result<TrainOutcome> {
        let cfg = &self.config;

        // ── Step 1: Load ─────────────────────────────────────────────────────
        let dataset = CsvDatasetLoader::new(&cfg.data_path).load()?;

        // ── Step 2: Split ────────────────────────────────────────────────────
        let split = stratified_split(&dataset.target, cfg.test_fraction, cfg.seed)?;
        let train_x = dataset.features.take_rows(&split.train);
        let test_x  = dataset.features.take_rows(&split.test);
        let train_y = take(&dataset.target, &split.train);
        let test_y  = take(&dataset.target, &split.test);
        tracing::info!("Split: {} train, {} test", train_y.len(), test_y.len());

        // ── Step 3: Preprocessor ─────────────────────────────────────────────
        let numeric     = train_x.numeric_columns();
        let categorical = train_x.categorical_columns();
        tracing::info!("Numeric columns: {:?}", numeric);
        tracing::info!("Categorical columns: {:?}", categorical);
        let preprocessor = build_preprocessor(&numeric, &categorical)?;

        // ── Step 4: Model ────────────────────────────────────────────────────
        let spec = get_model(&cfg.model, &cfg.params)?;
        let pipeline = Pipeline::new(preprocessor, spec.clone());

        // ── Step 5: Tracker run ──────────────────────────────────────────────
        let owned_tracker;
        let tracker: &dyn ExperimentTracker = match &self.tracker {
            Some(t) => &**t,
            None => {
                owned_tracker = tracker_for(&cfg.tracking_uri, &cfg.experiment)?;
                &*owned_tracker
            }
        };
        let tags = BTreeMap::from([
            ("model_type".to_string(), cfg.model.clone()),
            ("dataset".to_string(), cfg.dataset_name.clone()),
        ]);
        let run = tracker
            .start_run(&format!("{}_run", cfg.model), &tags)
            .context("Cannot open experiment run")?;

        // ── Steps 6–9 inside the run ─────────────────────────────────────────
        let model_params = spec.params();
        let run_input = RunInput { pipeline, spec, train_x, train_y, test_x, test_y };
        match self.run_inside(tracker, &run, run_input) {
            Ok((report, artifact)) => {
                tracker.end_run(&run, RunStatus::Finished)?;
                let model_path = self.export(&artifact, &report, model_params)?;
                Ok(TrainOutcome {
                    model: cfg.model.clone(),
                    run_id: run.run_id,
                    report,
                    model_path,
                })
            }
            Err(e) => {
                tracing::error!("Training run '{}' failed: {e:#}", run.run_name);
                if let Err(end_err) = tracker.end_run(&run, RunStatus::Failed) {
                    tracing::warn!("Could not mark run as failed: {end_err:#}");
                }
                Err(e)
            }
        }
    }

    fn run_inside(
        &self,
        tracker: &dyn ExperimentTracker,
        run:     &TrackedRun,
        input:   RunInput,
    ) -> Result<(EvaluationReport, ModelArtifact)> {
        let RunInput { pipeline, spec, train_x, train_y, test_x, test_y } = input;

        // ── Step 6: Fit ──────────────────────────────────────────────────────
        let fitted = pipeline.fit(&train_x, &train_y)?;

        // ── Step 7: Evaluate ─────────────────────────────────────────────────
        let proba = fitted.predict_proba(&test_x)?.to_vec();
        let pred: Vec<u8> = proba.iter().map(|&p| label(p)).collect();
        let report = EvaluationReport::compute(&test_y, &pred, &proba)?;
        tracing::info!(
            "Test metrics: roc_auc={:.4} accuracy={:.4} f1={:.4}",
            report.roc_auc,
            report.accuracy,
            report.f1
        );

        // ── Step 8: Log ──────────────────────────────────────────────────────
        tracker.log_params(run, &self.run_params(&spec))?;
        tracker.log_metrics(run, &report.as_map())?;

        let artifact = ModelArtifact::new(train_x.schema(), fitted);
        let bytes = artifact.encode()?;
        tracker.log_artifact(run, RUN_ARTIFACT_PATH, &bytes)?;

        Ok((report, artifact))
    }

    /// `Dataset` plus the model's effective hyperparameters.
    fn run_params(&self, spec: &ModelSpec) -> BTreeMap<String, String> {
        let mut params = spec.params();
        params.insert("Dataset".to_string(), self.config.dataset_name.clone());
        params
    }

    // ── Step 9: Export ───────────────────────────────────────────────────────
    fn export(
        &self,
        artifact: &ModelArtifact,
        report:   &EvaluationReport,
        params:   BTreeMap<String, String>,
    ) -> Result<PathBuf> {
        let cfg = &self.config;
        let store = ModelStore::new(&cfg.model_path);
        let metadata = ArtifactMetadata {
            model_type:     cfg.model.clone(),
            format_version: artifact.format_version,
            trained_at:     Utc::now(),
            dataset:        cfg.dataset_name.clone(),
            features:       artifact.pipeline.preprocessor().feature_names_out(),
            params,
            metrics:        report.as_map(),
        };
        store.save(artifact, &metadata)?;
        Ok(store.path().to_path_buf())
    }
}

struct RunInput {
    pipeline: Pipeline,
    spec:     ModelSpec,
    train_x:  Frame,
    train_y:  Vec<u8>,
    test_x:   Frame,
    test_y:   Vec<u8>,
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::tracking::FileTracker;
    use crate::testing::synthetic_csv;
    use serde_json::json;
    use std::fs;

    struct Scratch {
        dir:    tempfile::TempDir,
        config: TrainConfig,
    }

    fn scratch(model: &str, csv: String) -> Scratch {
        let dir = tempfile::tempdir().unwrap();
        let data_path = dir.path().join("churn.csv");
        fs::write(&data_path, csv).unwrap();

        let mut params = HyperParams::new();
        if model != "lr" {
            params.insert("n_estimators".into(), json!(10));
            params.insert("random_state".into(), json!(0));
        }
        let config = TrainConfig {
            model: model.to_string(),
            params,
            data_path: data_path.display().to_string(),
            model_path: dir.path().join("models/churn_model.bin").display().to_string(),
            ..TrainConfig::default()
        };
        Scratch { dir, config }
    }

    fn runs_root(s: &Scratch) -> std::path::PathBuf {
        s.dir.path().join("mlruns")
    }

    fn tracker(s: &Scratch) -> Box<dyn ExperimentTracker> {
        Box::new(FileTracker::new(runs_root(s), DEFAULT_EXPERIMENT))
    }

    #[test]
    fn test_full_run_records_everything() {
        let s = scratch("rf", synthetic_csv(300, 17));
        let outcome = TrainUseCase::new(s.config.clone())
            .with_tracker(tracker(&s))
            .execute()
            .unwrap();

        assert!(outcome.report.roc_auc > 0.5);
        assert!(outcome.summary().starts_with("  RF  AUC "));

        let run_dir = runs_root(&s).join(DEFAULT_EXPERIMENT).join(&outcome.run_id);
        let meta = FileTracker::new(runs_root(&s), DEFAULT_EXPERIMENT).read_meta(&outcome.run_id).unwrap();
        assert_eq!(meta.status, "FINISHED");
        assert_eq!(meta.run_name, "rf_run");

        let tags: BTreeMap<String, String> =
            serde_json::from_str(&fs::read_to_string(run_dir.join("tags.json")).unwrap()).unwrap();
        assert_eq!(tags["model_type"], "rf");
        assert_eq!(tags["dataset"], "bank-churn.csv");

        let params: BTreeMap<String, String> =
            serde_json::from_str(&fs::read_to_string(run_dir.join("params.json")).unwrap()).unwrap();
        assert_eq!(params["Dataset"], "bank-churn.csv");
        assert_eq!(params["n_estimators"], "10");

        let metrics: BTreeMap<String, f64> =
            serde_json::from_str(&fs::read_to_string(run_dir.join("metrics.json")).unwrap()).unwrap();
        assert_eq!(metrics.keys().collect::<Vec<_>>(), vec!["accuracy", "f1", "roc_auc"]);

        assert!(run_dir.join("artifacts").join(RUN_ARTIFACT_PATH).exists());
        let exported = ModelStore::new(&outcome.model_path).load().unwrap();
        assert_eq!(exported.model_type.token(), "rf");
    }

    #[test]
    fn test_unknown_model_opens_no_run() {
        let s = scratch("xyz", synthetic_csv(50, 1));
        let err = TrainUseCase::new(s.config.clone())
            .with_tracker(tracker(&s))
            .execute()
            .unwrap_err();
        assert!(err.to_string().contains("unknown model name: 'xyz'"));
        assert!(!runs_root(&s).exists());
    }

    #[test]
    fn test_failure_marks_run_failed() {
        // single-class target: ROC-AUC is undefined, so evaluation fails
        let csv = synthetic_csv(60, 3)
            .lines()
            .enumerate()
            .map(|(i, line)| {
                if i == 0 {
                    line.to_string()
                } else {
                    let (head, _) = line.rsplit_once(',').unwrap();
                    format!("{head},0")
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
        let s = scratch("rf", csv);
        assert!(TrainUseCase::new(s.config.clone()).with_tracker(tracker(&s)).execute().is_err());

        let exp_dir = runs_root(&s).join(DEFAULT_EXPERIMENT);
        let run_id = fs::read_dir(&exp_dir).unwrap().next().unwrap().unwrap().file_name();
        let meta = FileTracker::new(runs_root(&s), DEFAULT_EXPERIMENT)
            .read_meta(run_id.to_str().unwrap())
            .unwrap();
        assert_eq!(meta.status, "FAILED");
        assert!(!std::path::Path::new(&s.config.model_path).exists());
    }

    #[test]
    fn test_config_serialises() {
        let json = serde_json::to_string(&TrainConfig::default()).unwrap();
        let back: TrainConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.seed, 42);
        assert_eq!(back.experiment, "Bank-Churn-Prediction");
    }
}
