// ============================================================
// Layer 1 — HTTP API
// ============================================================
// axum front end of the prediction service.
//
//   GET  /         → service banner
//   GET  /health   → {"status":"ok"}
//   POST /predict  → {"predictions":[...], "probabilities":[...]}
//   GET  /metrics  → Prometheus text format
//
//   state.rs    — shared state injected into every handler
//   handlers.rs — one async fn per route
//   error.rs    — the only place errors become status codes

pub mod error;
pub mod handlers;
pub mod state;

use anyhow::{Context, Result};
use axum::{
    extract::{MatchedPath, Request},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use std::time::Instant;

use crate::application::predict_use_case::PredictionService;
use crate::infra::{
    metrics,
    model_cache::ModelLoader,
    model_store::{ModelStore, DEFAULT_MODEL_PATH},
};
use state::AppState;

// ─── Serve Configuration ──────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct ServeConfig {
    pub host:       String,
    pub port:       u16,
    pub model_path: String,
    /// Load the model before accepting requests
    pub preload:    bool,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            host:       "0.0.0.0".to_string(),
            port:       8000,
            model_path: DEFAULT_MODEL_PATH.to_string(),
            preload:    false,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/predict", post(handlers::predict))
        .route("/metrics", get(handlers::metrics))
        .route_layer(middleware::from_fn(track_metrics))
        .with_state(state)
}

/// Run the service until Ctrl-C.
fn log_model_metadata(loader: &ModelLoader) {
    match ModelStore::new(loader.path()).load_metadata() {
        Ok(meta) => tracing::info!(
            "Model '{}' trained {} on {} ({} features)",
            meta.model_type,
            meta.trained_at.to_rfc3339(),
            meta.dataset,
            meta.features.len()
        ),
        Err(e) => tracing::debug!("No model metadata: {e:#}"),
    }
}

pub async fn serve(config: ServeConfig) -> Result<()> {
    let service = PredictionService::new(ModelLoader::new(&config.model_path));

    if config.preload {
        // a failed warm-up is not cached; requests will retry the load
        match service.loader().get().await {
            Ok(_) => log_model_metadata(service.loader()),
            Err(e) => tracing::warn!("Preload failed, serving anyway: {e}"),
        }
    }

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Cannot bind to {addr}"))?;
    tracing::info!(
        "Serving churn predictions on http://{addr} (model: {}, loaded: {})",
        service.loader().path().display(),
        service.loader().is_loaded()
    );

    axum::serve(listener, router(AppState::new(service)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Record count and latency per matched route.
async fn track_metrics(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| req.uri().path().to_owned());
    let method = req.method().to_string();

    let response = next.run(req).await;

    metrics::observe_http_request(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );
    response
}
