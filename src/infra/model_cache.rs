// ============================================================
// Layer 6 — Model Loader / Cache
// ============================================================
// Loads the serving artifact on first use and keeps it for the
// life of the process.
//
//   first caller ──► OnceCell::get_or_try_init ──► spawn_blocking(load)
//   concurrent callers wait on the same initialisation
//   later callers   ──► the cached Arc (pointer-equal every time)
//
// A failed load is logged and returned but NOT cached: the next
// request tries again, so dropping a model file into place after
// start-up makes the service healthy without a restart. Once a
// load succeeds the artifact is never reloaded.

use std::{path::PathBuf, sync::Arc};
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::infra::model_store::{ModelArtifact, ModelStore};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum LoadError {
    #[error("model artifact not found at '{}'", .0.display())]
    NotFound(PathBuf),

    #[error("cannot read model artifact '{}': {message}", .path.display())]
    Unreadable { path: PathBuf, message: String },

    #[error("model artifact '{}' is corrupt: {message}", .path.display())]
    Corrupt { path: PathBuf, message: String },

    #[error(
        "model artifact '{}' has format version {found}, this build reads version {expected}",
        .path.display()
    )]
    UnsupportedVersion { path: PathBuf, found: u32, expected: u32 },

    #[error("model loading task failed: {0}")]
    Task(String),
}

pub struct ModelLoader {
    path:  PathBuf,
    cache: OnceCell<Arc<ModelArtifact>>,
}

impl ModelLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path:  path.into(),
            cache: OnceCell::new(),
        }
    }

    /// Loader that is already holding `artifact`.
    #[cfg(test)]
    pub fn preloaded(path: impl Into<PathBuf>, artifact: ModelArtifact) -> Self {
        Self {
            path:  path.into(),
            cache: OnceCell::new_with(Some(Arc::new(artifact))),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    pub fn is_loaded(&self) -> bool {
        self.cache.initialized()
    }

    /// The cached artifact, loading it first if needed.
    pub async fn get(&self) -> Result<Arc<ModelArtifact>, LoadError> {
        self.cache
            .get_or_try_init(|| async {
                let path = self.path.clone();
                tracing::info!("Loading model artifact from '{}'", path.display());

                let loaded = tokio::task::spawn_blocking(move || ModelStore::new(path).load())
                    .await
                    .map_err(|e| LoadError::Task(e.to_string()))?;

                match loaded {
                    Ok(artifact) => {
                        tracing::info!(
                            "Model ready: {} (format v{}, {} input columns)",
                            artifact.model_type,
                            artifact.format_version,
                            artifact.schema.len()
                        );
                        Ok(Arc::new(artifact))
                    }
                    Err(e) => {
                        tracing::error!("Model load failed: {e}");
                        Err(e)
                    }
                }
            })
            .await
            .cloned()
    }
}
