// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the outside world:
//
//   model_store.rs — Writing and reading the serving artifact
//                    (gzip + bincode, versioned) and its JSON
//                    metadata sidecar.
//
//   model_cache.rs — Process-wide lazy cache of the loaded
//                    artifact, shared by every request.
//
//   tracking.rs    — Experiment tracking backends: MLflow over
//                    its REST API, or a local directory.
//
//   metrics.rs     — Prometheus collectors for the service.

/// Artifact persistence
pub mod model_store;

/// Lazy, load-once model cache
pub mod model_cache;

/// MLflow and file-based run tracking
pub mod tracking;

/// Prometheus counters and histograms
pub mod metrics;
