//! Translate domain errors into HTTP responses.
//!
//! This is the only place status codes are decided; services stay free of
//! HTTP concerns. Bodies are structured JSON:
//! `{error, error_type, ...context}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;

use crate::error::DomainError;

pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = match &err {
            DomainError::RuleNotFound { .. }
            | DomainError::ExchangeNotFound { .. }
            | DomainError::DatasetNotFound(_)
            | DomainError::RecordNotFound(_) => StatusCode::NOT_FOUND,
            DomainError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let mut body = serde_json::json!({
            "error": err.to_string(),
            "error_type": err.error_type(),
        });
        match &err {
            DomainError::RuleNotFound { available, .. }
            | DomainError::ExchangeNotFound { available, .. } => {
                body["available"] = serde_json::json!(available);
            }
            DomainError::CircularInclude { chain } => {
                body["chain"] = serde_json::json!(chain);
            }
            _ => {}
        }

        if status.is_server_error() {
            tracing::error!(error = %body["error"], "request failed");
        }
        (status, Json::<Value>(body)).into_response()
    }
}
