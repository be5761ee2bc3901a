// ============================================================
// Layer 1 — HTTP Error Mapping
// ============================================================
//   malformed body / missing field / wrong type → 422
//   field constraint violated                   → 422
//   model missing, corrupt or inference failure → 500
//
// Every error body is `{"detail": ...}`.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::application::predict_use_case::PredictError;
use crate::domain::customer::ValidationError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Body(#[from] JsonRejection),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Internal(String),
}

impl From<PredictError> for ApiError {
    fn from(e: PredictError) -> Self {
        match e {
            PredictError::Invalid(v) => ApiError::Validation(v),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            ApiError::Body(rejection) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!([{
                    "loc":  ["body"],
                    "msg":  rejection.body_text(),
                    "type": "json_invalid",
                }]),
            ),
            ApiError::Validation(v) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!([{
                    "loc":  ["body", "data", v.index, v.field],
                    "msg":  v.message,
                    "type": "value_error",
                }]),
            ),
            ApiError::Internal(message) => {
                tracing::error!("Request failed: {message}");
                (StatusCode::INTERNAL_SERVER_ERROR, json!(message))
            }
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
