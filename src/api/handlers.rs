use axum::{
    extract::{rejection::JsonRejection, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};

use super::{error::ApiError, state::AppState};
use crate::domain::{customer::CustomerBatch, prediction::PredictionResult};
use crate::infra::metrics::gather_text;

pub async fn root() -> Json<Value> {
    Json(json!({ "message": "Bank Churn Prediction API. POST customer records to /predict." }))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Score a batch of customers.
pub async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<CustomerBatch>, JsonRejection>,
) -> Result<Json<PredictionResult>, ApiError> {
    let Json(batch) = payload?;
    tracing::debug!("Predict request with {} records", batch.data.len());
    let result = state.service.predict(batch.data).await?;
    Ok(Json(result))
}

pub async fn metrics() -> Result<impl IntoResponse, ApiError> {
    let text = gather_text().map_err(|e| ApiError::Internal(format!("{e:#}")))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], text))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use crate::api::{router, state::AppState};
    use crate::application::predict_use_case::PredictionService;
    use crate::infra::model_cache::ModelLoader;
    use crate::testing::{fitted_artifact, sample_customer};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> Router {
        let loader = ModelLoader::preloaded("unused.bin", fitted_artifact());
        router(AppState::new(PredictionService::new(loader)))
    }

    fn app_without_model() -> Router {
        let loader = ModelLoader::new("/definitely/missing/churn_model.bin");
        router(AppState::new(PredictionService::new(loader)))
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn post_json(body: Value) -> Request<Body> {
        Request::post("/predict")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn batch(records: Vec<Value>) -> Value {
        json!({ "data": records })
    }

    fn sample_json() -> Value {
        serde_json::to_value(sample_customer()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(app(), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn test_root_message() {
        let (status, body) = send(app(), get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["message"].as_str().unwrap().contains("Churn"));
    }

    #[tokio::test]
    async fn test_predict_sample_customer() {
        let (status, body) = send(app(), post_json(batch(vec![sample_json()]))).await;
        assert_eq!(status, StatusCode::OK);

        let preds = body["predictions"].as_array().unwrap();
        let probs = body["probabilities"].as_array().unwrap();
        assert_eq!(preds.len(), 1);
        assert_eq!(probs.len(), 1);
        assert!(matches!(preds[0].as_u64(), Some(0) | Some(1)));
        assert!((0.0..=1.0).contains(&probs[0].as_f64().unwrap()));
    }

    #[tokio::test]
    async fn test_predict_empty_batch() {
        let (status, body) = send(app_without_model(), post_json(batch(vec![]))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "predictions": [], "probabilities": [] }));
    }

    #[tokio::test]
    async fn test_missing_field_is_422() {
        let mut record = sample_json();
        record.as_object_mut().unwrap().remove("CreditScore");
        let (status, body) = send(app(), post_json(batch(vec![record]))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["detail"].is_array());
    }

    #[tokio::test]
    async fn test_wrong_type_is_422() {
        let mut record = sample_json();
        record["Age"] = json!("forty-five");
        let (status, _) = send(app(), post_json(batch(vec![record]))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_missing_content_type_is_422() {
        let req = Request::post("/predict")
            .body(Body::from(batch(vec![sample_json()]).to_string()))
            .unwrap();
        let (status, body) = send(app(), req).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["detail"].is_array());
    }

    #[tokio::test]
    async fn test_range_violation_is_422() {
        let mut record = sample_json();
        record["NumOfProducts"] = json!(9);
        let (status, body) = send(app(), post_json(batch(vec![sample_json(), record]))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["detail"][0]["loc"], json!(["body", "data", 1, "NumOfProducts"]));
    }

    #[tokio::test]
    async fn test_gender_case_invariant() {
        let mut upper = sample_json();
        upper["Gender"] = json!("FEMALE");
        let (_, a) = send(app(), post_json(batch(vec![sample_json()]))).await;
        let (_, b) = send(app(), post_json(batch(vec![upper]))).await;
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_missing_model_is_500() {
        let (status, body) = send(app_without_model(), post_json(batch(vec![sample_json()]))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["detail"].as_str().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn test_metrics_exposes_route_counter() {
        let app = app();
        send(app.clone(), get("/health")).await;
        let resp = app.oneshot(get("/metrics")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("churn_http_requests_total"));
        assert!(text.contains("path=\"/health\""));
    }
}
