use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use xtts_core::TtsError;

/// Message returned to callers for every internal failure. Details stay in
/// the server log.
pub const SYNTHESIS_FAILED: &str = "Speech synthesis failed";

/// API Error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidInput(String),

    #[error(transparent)]
    Tts(#[from] TtsError),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Tts(TtsError::Validation(msg)) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Tts(e) => {
                // Already logged with its pipeline stage by the service
                tracing::debug!(kind = e.kind(), "Synthesis error: {e:#}");
                (StatusCode::INTERNAL_SERVER_ERROR, SYNTHESIS_FAILED.to_string())
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, SYNTHESIS_FAILED.to_string())
            }
        };

        (status, Json(ErrorResponse { error: error_message })).into_response()
    }
}
