// ============================================================
// Layer 6 — Experiment Tracking
// ============================================================
// Two ExperimentTracker implementations, chosen by URI:
//
//   http(s)://host:port  → MlflowTracker (MLflow REST API 2.0)
//   file:<dir>           → FileTracker   (plain JSON files)
//
// MlflowTracker call sequence for one training run:
//
//   GET  experiments/get-by-name   (404 → POST experiments/create)
//   POST runs/create               run_name + tags
//   POST runs/log-batch            params, then metrics
//   PUT  mlflow-artifacts/artifacts/<exp>/<run>/artifacts/<path>
//   POST runs/update               status FINISHED / FAILED
//
// FileTracker layout:
//
//   <dir>/<experiment>/<run_id>/meta.json
//                               params.json
//                               metrics.json
//                               tags.json
//                               artifacts/<path>
//
// Both are blocking; training runs outside any async runtime.

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use rand::Rng;
use reqwest::blocking::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
    time::Duration,
};

use crate::domain::traits::{ExperimentTracker, RunStatus, TrackedRun};

pub const DEFAULT_TRACKING_URI: &str = "http://127.0.0.1:5000";
pub const DEFAULT_EXPERIMENT: &str = "Bank-Churn-Prediction";

/// Pick a tracker implementation from a tracking URI.
pub fn tracker_for(uri: &str, experiment: &str) -> Result<Box<dyn ExperimentTracker>> {
    if let Some(dir) = uri.strip_prefix("file:") {
        let dir = dir.strip_prefix("//").unwrap_or(dir);
        return Ok(Box::new(FileTracker::new(dir, experiment)));
    }
    if uri.starts_with("http://") || uri.starts_with("https://") {
        return Ok(Box::new(MlflowTracker::new(uri, experiment)?));
    }
    bail!("unsupported tracking URI '{uri}' (expected http(s):// or file:)")
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

// ─── MLflow REST ──────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct KeyValue<'a> {
    key:   &'a str,
    value: &'a str,
}

#[derive(Deserialize)]
struct ExperimentResponse {
    experiment: ExperimentInfo,
}

#[derive(Deserialize)]
struct ExperimentInfo {
    experiment_id: String,
}

#[derive(Deserialize)]
struct CreateExperimentResponse {
    experiment_id: String,
}

#[derive(Deserialize)]
struct RunResponse {
    run: RunBody,
}

#[derive(Deserialize)]
struct RunBody {
    info: RunInfo,
}

#[derive(Deserialize)]
struct RunInfo {
    run_id:       String,
    #[serde(default)]
    artifact_uri: String,
}

pub struct MlflowTracker {
    client:        Client,
    base_url:      String,
    experiment:    String,
    experiment_id: Mutex<Option<String>>,
}

impl MlflowTracker {
    pub fn new(base_url: &str, experiment: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Cannot build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            experiment: experiment.to_string(),
            experiment_id: Mutex::new(None),
        })
    }

    fn api(&self, endpoint: &str) -> String {
        format!("{}/api/2.0/mlflow/{endpoint}", self.base_url)
    }

    fn post(&self, endpoint: &str, body: &Value) -> Result<Response> {
        let resp = self
            .client
            .post(self.api(endpoint))
            .json(body)
            .send()
            .with_context(|| format!("MLflow request '{endpoint}' failed"))?;
        check(resp, endpoint)
    }

    /// Experiment id by name, creating the experiment on first use.
    fn experiment_id(&self) -> Result<String> {
        let mut cached = self
            .experiment_id
            .lock()
            .map_err(|_| anyhow!("experiment id lock poisoned"))?;
        if let Some(id) = cached.as_ref() {
            return Ok(id.clone());
        }

        let resp = self
            .client
            .get(self.api("experiments/get-by-name"))
            .query(&[("experiment_name", self.experiment.as_str())])
            .send()
            .context("MLflow request 'experiments/get-by-name' failed")?;

        let id = if resp.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::info!("Creating MLflow experiment '{}'", self.experiment);
            let created: CreateExperimentResponse = self
                .post("experiments/create", &json!({ "name": self.experiment }))?
                .json()
                .context("Bad response from 'experiments/create'")?;
            created.experiment_id
        } else {
            let found: ExperimentResponse = check(resp, "experiments/get-by-name")?
                .json()
                .context("Bad response from 'experiments/get-by-name'")?;
            found.experiment.experiment_id
        };

        *cached = Some(id.clone());
        Ok(id)
    }

    fn log_batch(&self, run: &TrackedRun, body: Value) -> Result<()> {
        let mut body = body;
        body["run_id"] = json!(run.run_id);
        self.post("runs/log-batch", &body)?;
        Ok(())
    }
}

fn check(resp: Response, endpoint: &str) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let detail = resp.text().unwrap_or_default();
    bail!("MLflow '{endpoint}' returned {status}: {detail}")
}

/// `mlflow-artifacts:/<exp>/<run>/artifacts` → `<exp>/<run>/artifacts`.
/// Other artifact stores cannot be written through the tracking server.
fn proxied_artifact_root(artifact_uri: &str) -> Option<&str> {
    artifact_uri
        .strip_prefix("mlflow-artifacts:")
        .map(|rest| rest.trim_start_matches('/'))
        .map(|rest| match rest.find('/') {
            // "mlflow-artifacts://host:port/..." carries an authority
            Some(i) if rest[..i].contains(':') => &rest[i + 1..],
            _ => rest,
        })
}

impl ExperimentTracker for MlflowTracker {
    fn start_run(&self, run_name: &str, tags: &BTreeMap<String, String>) -> Result<TrackedRun> {
        let experiment_id = self.experiment_id()?;
        let mut tag_list: Vec<KeyValue> = tags
            .iter()
            .map(|(k, v)| KeyValue { key: k, value: v })
            .collect();
        tag_list.push(KeyValue { key: "mlflow.runName", value: run_name });

        let created: RunResponse = self
            .post(
                "runs/create",
                &json!({
                    "experiment_id": experiment_id,
                    "run_name": run_name,
                    "start_time": now_millis(),
                    "tags": tag_list,
                }),
            )?
            .json()
            .context("Bad response from 'runs/create'")?;

        tracing::info!(
            "MLflow run '{}' started ({})",
            run_name,
            created.run.info.run_id
        );
        Ok(TrackedRun {
            run_id:       created.run.info.run_id,
            run_name:     run_name.to_string(),
            artifact_uri: created.run.info.artifact_uri,
        })
    }

    fn log_params(&self, run: &TrackedRun, params: &BTreeMap<String, String>) -> Result<()> {
        let params: Vec<KeyValue> = params
            .iter()
            .map(|(k, v)| KeyValue { key: k, value: v })
            .collect();
        self.log_batch(run, json!({ "params": params }))
    }

    fn log_metrics(&self, run: &TrackedRun, metrics: &BTreeMap<String, f64>) -> Result<()> {
        let timestamp = now_millis();
        let metrics: Vec<Value> = metrics
            .iter()
            .map(|(k, v)| json!({ "key": k, "value": v, "timestamp": timestamp, "step": 0 }))
            .collect();
        self.log_batch(run, json!({ "metrics": metrics }))
    }

    fn log_artifact(&self, run: &TrackedRun, artifact_path: &str, bytes: &[u8]) -> Result<()> {
        let Some(root) = proxied_artifact_root(&run.artifact_uri) else {
            tracing::warn!(
                "Artifact store '{}' is not proxied by the tracking server; '{}' not uploaded",
                run.artifact_uri,
                artifact_path
            );
            return Ok(());
        };
        let url = format!(
            "{}/api/2.0/mlflow-artifacts/artifacts/{}/{}",
            self.base_url,
            root.trim_end_matches('/'),
            artifact_path.trim_start_matches('/')
        );
        let resp = self
            .client
            .put(url)
            .body(bytes.to_vec())
            .send()
            .context("MLflow artifact upload failed")?;
        check(resp, "mlflow-artifacts")?;
        tracing::info!("Uploaded artifact '{}' ({} bytes)", artifact_path, bytes.len());
        Ok(())
    }

    fn end_run(&self, run: &TrackedRun, status: RunStatus) -> Result<()> {
        self.post(
            "runs/update",
            &json!({
                "run_id": run.run_id,
                "status": status.as_str(),
                "end_time": now_millis(),
            }),
        )?;
        tracing::info!("MLflow run '{}' ended: {}", run.run_name, status.as_str());
        Ok(())
    }
}

// ─── Local file store ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMeta {
    pub run_id:     String,
    pub run_name:   String,
    pub experiment: String,
    pub status:     String,
    pub start_time: i64,
    pub end_time:   Option<i64>,
}

pub struct FileTracker {
    root:       PathBuf,
    experiment: String,
}

impl FileTracker {
    pub fn new(root: impl Into<PathBuf>, experiment: &str) -> Self {
        Self {
            root:       root.into(),
            experiment: experiment.to_string(),
        }
    }

    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.root.join(&self.experiment).join(run_id)
    }

    fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(value)?)
            .with_context(|| format!("Failed to write '{}'", path.display()))
    }

    /// Merge `entries` into an existing JSON object file.
    fn merge_json<V: Serialize>(path: &Path, entries: &BTreeMap<String, V>) -> Result<()> {
        let mut current: BTreeMap<String, Value> = match fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text)
                .with_context(|| format!("Corrupt tracker file '{}'", path.display()))?,
            Err(_) => BTreeMap::new(),
        };
        for (k, v) in entries {
            current.insert(k.clone(), serde_json::to_value(v)?);
        }
        Self::write_json(path, &current)
    }

    pub fn read_meta(&self, run_id: &str) -> Result<RunMeta> {
        let path = self.run_dir(run_id).join("meta.json");
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?;
        Ok(serde_json::from_str(&text)?)
    }
}

impl ExperimentTracker for FileTracker {
    fn start_run(&self, run_name: &str, tags: &BTreeMap<String, String>) -> Result<TrackedRun> {
        let run_id = format!("{:032x}", rand::thread_rng().gen::<u128>());
        let dir = self.run_dir(&run_id);
        fs::create_dir_all(dir.join("artifacts"))
            .with_context(|| format!("Cannot create run directory '{}'", dir.display()))?;

        let meta = RunMeta {
            run_id:     run_id.clone(),
            run_name:   run_name.to_string(),
            experiment: self.experiment.clone(),
            status:     "RUNNING".to_string(),
            start_time: now_millis(),
            end_time:   None,
        };
        Self::write_json(&dir.join("meta.json"), &meta)?;
        Self::write_json(&dir.join("tags.json"), tags)?;

        tracing::info!("Run '{}' started in '{}'", run_name, dir.display());
        Ok(TrackedRun {
            run_id,
            run_name: run_name.to_string(),
            artifact_uri: dir.join("artifacts").display().to_string(),
        })
    }

    fn log_params(&self, run: &TrackedRun, params: &BTreeMap<String, String>) -> Result<()> {
        Self::merge_json(&self.run_dir(&run.run_id).join("params.json"), params)
    }

    fn log_metrics(&self, run: &TrackedRun, metrics: &BTreeMap<String, f64>) -> Result<()> {
        Self::merge_json(&self.run_dir(&run.run_id).join("metrics.json"), metrics)
    }

    fn log_artifact(&self, run: &TrackedRun, artifact_path: &str, bytes: &[u8]) -> Result<()> {
        let target = self
            .run_dir(&run.run_id)
            .join("artifacts")
            .join(artifact_path.trim_start_matches('/'));
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, bytes)
            .with_context(|| format!("Failed to write artifact '{}'", target.display()))
    }

    fn end_run(&self, run: &TrackedRun, status: RunStatus) -> Result<()> {
        let mut meta = self.read_meta(&run.run_id)?;
        meta.status = status.as_str().to_string();
        meta.end_time = Some(now_millis());
        Self::write_json(&self.run_dir(&run.run_id).join("meta.json"), &meta)
    }
}
