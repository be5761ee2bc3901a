// ============================================================
// Layer 6 — Service Metrics
// ============================================================
// Prometheus collectors for the prediction service, registered
// in the process-wide default registry and exposed as text on
// GET /metrics.
//
//   churn_http_requests_total{method,path,status}      counter
//   churn_http_request_duration_seconds{method,path}   histogram
//   churn_predictions_total{outcome}                   counter
//   churn_unseen_categories_total{column}              counter
//
// `path` is the matched route template, never the raw URI, so
// label cardinality stays bounded.

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};

lazy_static! {
    static ref HTTP_REQUESTS: IntCounterVec = register_int_counter_vec!(
        "churn_http_requests_total",
        "HTTP requests handled, by route and status code",
        &["method", "path", "status"]
    )
    .unwrap();

    static ref HTTP_LATENCY: HistogramVec = register_histogram_vec!(
        "churn_http_request_duration_seconds",
        "HTTP request latency in seconds",
        &["method", "path"],
        vec![0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .unwrap();

    static ref PREDICTIONS: IntCounterVec = register_int_counter_vec!(
        "churn_predictions_total",
        "Individual customer predictions, by predicted outcome",
        &["outcome"]
    )
    .unwrap();

    static ref UNSEEN_CATEGORIES: IntCounterVec = register_int_counter_vec!(
        "churn_unseen_categories_total",
        "Categorical values not seen at training time, encoded as all zeros",
        &["column"]
    )
    .unwrap();
}

pub fn observe_http_request(method: &str, path: &str, status: u16, seconds: f64) {
    let status = status.to_string();
    HTTP_REQUESTS
        .with_label_values(&[method, path, status.as_str()])
        .inc();
    HTTP_LATENCY.with_label_values(&[method, path]).observe(seconds);
}

/// Count one batch of predictions by outcome.
pub fn record_predictions(churned: usize, retained: usize) {
    PREDICTIONS.with_label_values(&["churn"]).inc_by(churned as u64);
    PREDICTIONS.with_label_values(&["retain"]).inc_by(retained as u64);
}

pub fn record_unseen_category(column: &str, count: usize) {
    UNSEEN_CATEGORIES.with_label_values(&[column]).inc_by(count as u64);
}

#[cfg(test)]
pub fn unseen_category_count(column: &str) -> u64 {
    UNSEEN_CATEGORIES.with_label_values(&[column]).get()
}

/// Render every registered metric in the Prometheus text format.
pub fn gather_text() -> Result<String> {
    // touch the collectors so they appear even before first use
    lazy_static::initialize(&HTTP_REQUESTS);
    lazy_static::initialize(&HTTP_LATENCY);
    lazy_static::initialize(&PREDICTIONS);
    lazy_static::initialize(&UNSEEN_CATEGORIES);

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&prometheus::gather(), &mut buffer)
        .context("Failed to encode metrics")?;
    String::from_utf8(buffer).context("Metrics output is not UTF-8")
}
