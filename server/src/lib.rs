//! HTTP boundary of the Wolof XTTS service.

pub mod config;
pub mod error;
pub mod validation;

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};
use xtts_core::SynthesisService;

use crate::config::{ServerConfig, MAX_BODY_BYTES};
use crate::error::ApiError;
use crate::validation::parse_synthesis_request;

pub const OUTPUT_FILENAME: &str = "generated_audio.wav";

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SynthesisService>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    device: String,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        device: state.service.device().to_string(),
    })
}

/// `POST /predict`: synthesize the posted text and answer with a WAV file.
pub async fn predict(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let request = parse_synthesis_request(&body)?;

    // Synthesis is blocking and compute-bound
    let audio = tokio::task::spawn_blocking({
        let service = state.service.clone();
        move || service.handle(&request)
    })
    .await
    .map_err(|e| ApiError::InternalError(format!("synthesis task failed: {e}")))??;

    Ok((
        [
            (header::CONTENT_TYPE, "audio/wav".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{OUTPUT_FILENAME}\""),
            ),
        ],
        audio,
    )
        .into_response())
}

/// Tag every request and its response with a fresh `x-request-id`.
async fn add_request_id(mut request: Request, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let Ok(value) = HeaderValue::from_str(&request_id) else {
        return next.run(request).await;
    };
    request.headers_mut().insert("x-request-id", value.clone());
    let mut response = next.run(request).await;
    response.headers_mut().insert("x-request-id", value);
    response
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .allow_credentials(false);

    let Some(allowed_origins) = &config.cors_allowed_origins else {
        warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins");
        return base.allow_origin(Any);
    };

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();
    if origins.is_empty() {
        warn!("CORS_ALLOWED_ORIGINS is empty, falling back to permissive CORS");
        base.allow_origin(Any)
    } else {
        info!("CORS configured for {} origin(s)", origins.len());
        base.allow_origin(AllowOrigin::list(origins))
    }
}

pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(cors_layer(config))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .into_inner();

    Router::new()
        .route("/health", get(health_check))
        .route("/predict", post(predict))
        .layer(DefaultBodyLimit::disable())
        .layer(axum::middleware::from_fn(add_request_id))
        .layer(middleware_stack)
        .with_state(state)
}
