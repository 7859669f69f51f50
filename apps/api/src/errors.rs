use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::pipeline::error::PipelineError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unprocessable entity: {0}")]
    UnprocessableEntity(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::InvalidRecord { .. } => AppError::Validation(err.to_string()),
            PipelineError::EmptyReference | PipelineError::UnreadableReference(_) => {
                AppError::UnprocessableEntity(err.to_string())
            }
            PipelineError::UnsupportedModel(_) | PipelineError::Configuration(_) => {
                AppError::Configuration(err.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::UnprocessableEntity(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "UNPROCESSABLE_ENTITY",
                msg.clone(),
            ),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::Configuration(msg) => {
                tracing::error!("Configuration error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CONFIGURATION_ERROR",
                    "The assessment service is misconfigured".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_errors_map_to_statuses() {
        let cases = [
            (
                PipelineError::InvalidRecord {
                    index: 2,
                    reason: "missing job_url".into(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (PipelineError::EmptyReference, StatusCode::UNPROCESSABLE_ENTITY),
            (
                PipelineError::UnreadableReference("bad xref".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                PipelineError::Configuration("401".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(AppError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn test_conflict_status() {
        let response = AppError::Conflict("busy".into()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
