// ============================================================
// Layer 6 — Model Store
// ============================================================
// Persists the fitted pipeline for the prediction service.
//
// What gets written per export:
//   1. churn_model.bin   — gzip(bincode(ModelArtifact))
//   2. churn_model.json  — human-readable metadata sidecar
//                          (model type, params, metrics, time)
//
// ModelArtifact is a versioned envelope:
//
//   ┌────────────────┬────────────┬───────────────┬──────────────┐
//   │ format_version │ model_type │ FeatureSchema │ FittedPipeline│
//   └────────────────┴────────────┴───────────────┴──────────────┘
//
// format_version is the first bincode field, so a reader can
// check it before attempting to decode the rest. Only the .bin
// file is needed to serve; the sidecar is informational.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    io::{Read, Write},
    path::{Path, PathBuf},
};

use crate::data::frame::Frame;
use crate::domain::schema::FeatureSchema;
use crate::infra::model_cache::LoadError;
use crate::ml::model::ModelKind;
use crate::ml::pipeline::FittedPipeline;

/// Bumped whenever the artifact layout changes incompatibly.
pub const FORMAT_VERSION: u32 = 1;

/// Default location of the serving artifact.
pub const DEFAULT_MODEL_PATH: &str = "models/churn_model.bin";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub model_type:     ModelKind,
    pub schema:         FeatureSchema,
    pub pipeline:       FittedPipeline,
}

impl ModelArtifact {
    pub fn new(schema: FeatureSchema, pipeline: FittedPipeline) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            model_type: pipeline.model().kind(),
            schema,
            pipeline,
        }
    }

    /// Churn probabilities after checking `frame` against the
    /// training schema (by column name and kind).
    pub fn predict_proba(&self, frame: &Frame) -> Result<Array1<f64>> {
        frame
            .check_schema(&self.schema)
            .context("Input does not match the model's feature schema")?;
        self.pipeline.predict_proba(frame)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let raw = bincode::serialize(self).context("Failed to serialise model artifact")?;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw)?;
        Ok(encoder.finish()?)
    }

    /// Decode bytes produced by [`ModelArtifact::encode`]. `path`
    /// only labels the error.
    pub fn decode(bytes: &[u8], path: &Path) -> std::result::Result<Self, LoadError> {
        let corrupt = |message: String| LoadError::Corrupt {
            path: path.to_path_buf(),
            message,
        };

        let mut raw = Vec::new();
        GzDecoder::new(bytes)
            .read_to_end(&mut raw)
            .map_err(|e| corrupt(format!("not a gzip stream: {e}")))?;

        let version: u32 = bincode::deserialize(&raw).map_err(|e| corrupt(e.to_string()))?;
        if version != FORMAT_VERSION {
            return Err(LoadError::UnsupportedVersion {
                path: path.to_path_buf(),
                found: version,
                expected: FORMAT_VERSION,
            });
        }
        bincode::deserialize(&raw).map_err(|e| corrupt(e.to_string()))
    }
}

/// Informational sidecar written next to the artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub model_type:     String,
    pub format_version: u32,
    pub trained_at:     DateTime<Utc>,
    pub dataset:        String,
    pub features:       Vec<String>,
    pub params:         BTreeMap<String, String>,
    pub metrics:        BTreeMap<String, f64>,
}

pub struct ModelStore {
    path: PathBuf,
}

impl ModelStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.path.with_extension("json")
    }

    /// Write the artifact (via a temp file + rename) and its sidecar.
    pub fn save(&self, artifact: &ModelArtifact, metadata: &ArtifactMetadata) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Cannot create model directory '{}'", dir.display()))?;
        }

        let bytes = artifact.encode()?;
        let tmp = self.path.with_extension("bin.tmp");
        fs::write(&tmp, &bytes)
            .with_context(|| format!("Failed to write '{}'", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to move artifact into '{}'", self.path.display()))?;

        let meta_path = self.metadata_path();
        fs::write(&meta_path, serde_json::to_string_pretty(metadata)?)
            .with_context(|| format!("Failed to write '{}'", meta_path.display()))?;

        tracing::info!(
            "Saved {} model artifact to '{}' ({} bytes)",
            artifact.model_type,
            self.path.display(),
            bytes.len()
        );
        Ok(())
    }

    pub fn load(&self) -> std::result::Result<ModelArtifact, LoadError> {
        let bytes = fs::read(&self.path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LoadError::NotFound(self.path.clone())
            } else {
                LoadError::Unreadable {
                    path:    self.path.clone(),
                    message: e.to_string(),
                }
            }
        })?;
        ModelArtifact::decode(&bytes, &self.path)
    }

    pub fn load_metadata(&self) -> Result<ArtifactMetadata> {
        let path = self.metadata_path();
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?;
        Ok(serde_json::from_str(&text)?)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fitted_artifact, sample_metadata};

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path().join("nested/churn_model.bin"));
        let artifact = fitted_artifact();

        store.save(&artifact, &sample_metadata()).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded, artifact);
        assert_eq!(store.load_metadata().unwrap().model_type, "rf");
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = ModelStore::new(dir.path().join("absent.bin")).load().unwrap_err();
        assert!(matches!(err, LoadError::NotFound(_)));
    }

    #[test]
    fn test_garbage_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.bin");
        fs::write(&path, b"definitely not gzip").unwrap();
        let err = ModelStore::new(&path).load().unwrap_err();
        assert!(matches!(err, LoadError::Corrupt { .. }));
    }

    #[test]
    fn test_future_version_rejected() {
        let mut artifact = fitted_artifact();
        artifact.format_version = FORMAT_VERSION + 1;
        let bytes = artifact.encode().unwrap();
        let err = ModelArtifact::decode(&bytes, Path::new("v2.bin")).unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedVersion { found, .. } if found == FORMAT_VERSION + 1));
    }

    #[test]
    fn test_schema_mismatch_rejected() {
        let artifact = fitted_artifact();
        let mut frame = Frame::new();
        frame
            .push_column("Age", crate::data::frame::Column::Numeric(vec![40.0]))
            .unwrap();
        assert!(artifact.predict_proba(&frame).is_err());
    }
}
