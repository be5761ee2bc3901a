// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The training use case talks to an experiment tracker only
// through this trait, so the same workflow can report to a
// remote MLflow server or to a local directory of JSON files.
//
// Implementations (Layer 6):
//   - MlflowTracker → MLflow REST API over HTTP
//   - FileTracker   → runs written under a local directory

use std::collections::BTreeMap;

use anyhow::Result;

/// Final state of a tracked run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Finished,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Finished => "FINISHED",
            RunStatus::Failed   => "FAILED",
        }
    }
}

/// Handle to an open run on some tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedRun {
    pub run_id:       String,
    pub run_name:     String,
    pub artifact_uri: String,
}

// ─── ExperimentTracker ────────────────────────────────────────────────────────
/// Anything that can record a training run's parameters, metrics
/// and artifacts for later comparison.
pub trait ExperimentTracker {
    /// Open a new run tagged with the given key/value pairs.
    fn start_run(&self, run_name: &str, tags: &BTreeMap<String, String>) -> Result<TrackedRun>;

    fn log_params(&self, run: &TrackedRun, params: &BTreeMap<String, String>) -> Result<()>;

    fn log_metrics(&self, run: &TrackedRun, metrics: &BTreeMap<String, f64>) -> Result<()>;

    /// Store `bytes` under `artifact_path` (e.g. "model/model.bin") in the run.
    fn log_artifact(&self, run: &TrackedRun, artifact_path: &str, bytes: &[u8]) -> Result<()>;

    fn end_run(&self, run: &TrackedRun, status: RunStatus) -> Result<()>;
}
