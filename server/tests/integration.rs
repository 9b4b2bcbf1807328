//! Integration tests for the synthesis HTTP surface

mod common;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::*;

fn post_predict(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/predict")
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> Response {
    app.oneshot(request).await.unwrap()
}

async fn json_body(response: Response) -> Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let scratch = tempfile::tempdir().unwrap();
    let model = FakeModel::default();
    let app = create_test_app(model.clone(), scratch.path());

    let response = send(
        app,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["device"], "cpu");
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn test_health_after_failed_predict() {
    let scratch = tempfile::tempdir().unwrap();
    let app = create_test_app(
        FakeModel {
            fail: true,
            ..FakeModel::default()
        },
        scratch.path(),
    );

    let response = send(app.clone(), post_predict(json!({"text": "salaam"}).to_string())).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let response = send(
        app,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_predict_returns_wav() {
    let scratch = tempfile::tempdir().unwrap();
    let model = FakeModel::default();
    let app = create_test_app(model.clone(), scratch.path());
    let before = listing(scratch.path());

    let response = send(app, post_predict(json!({"text": "Naka nga def?"}).to_string())).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/wav");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"generated_audio.wav\""
    );
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[0..4], b"RIFF");
    assert_eq!(&body[8..12], b"WAVE");
    assert_eq!(model.calls(), 1);
    assert_eq!(listing(scratch.path()), before);
}

#[tokio::test]
async fn test_predict_without_content_type() {
    let scratch = tempfile::tempdir().unwrap();
    let app = create_test_app(FakeModel::default(), scratch.path());

    let request = Request::builder()
        .method("POST")
        .uri("/predict")
        .body(Body::from(r#"{"text": "Jërëjëf"}"#))
        .unwrap();
    let response = send(app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_predict_missing_text() {
    let scratch = tempfile::tempdir().unwrap();
    let model = FakeModel::default();

    for body in [
        json!({}).to_string(),
        json!({"text": ""}).to_string(),
        json!({"speed": 1.2}).to_string(),
        String::new(),
    ] {
        let app = create_test_app(model.clone(), scratch.path());
        let response = send(app, post_predict(body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "No text provided");
    }
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn test_predict_invalid_json() {
    let scratch = tempfile::tempdir().unwrap();
    let model = FakeModel::default();
    let app = create_test_app(model.clone(), scratch.path());

    let response = send(app, post_predict("{\"text\": ")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "Invalid JSON payload");
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn test_predict_bad_speed() {
    let scratch = tempfile::tempdir().unwrap();
    let model = FakeModel::default();
    let app = create_test_app(model.clone(), scratch.path());

    let response = send(app, post_predict(json!({"text": "salaam", "speed": 10.0}).to_string())).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn test_predict_synthesis_failure() {
    let scratch = tempfile::tempdir().unwrap();
    let model = FakeModel {
        fail: true,
        ..FakeModel::default()
    };
    let app = create_test_app(model.clone(), scratch.path());
    let before = listing(scratch.path());

    let response = send(app, post_predict(json!({"text": "salaam"}).to_string())).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    let message = body["error"].as_str().unwrap();
    assert!(!message.is_empty());
    assert!(!message.contains("CUDA"));
    assert_eq!(model.calls(), 1);
    assert_eq!(listing(scratch.path()), before);
}

#[tokio::test]
async fn test_predict_unsupported_language() {
    let scratch = tempfile::tempdir().unwrap();
    let model = FakeModel::default();
    let app = create_test_app(model.clone(), scratch.path());

    let response = send(
        app,
        post_predict(json!({"text": "bonjour", "language": "fr"}).to_string()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn test_predict_body_too_large() {
    let scratch = tempfile::tempdir().unwrap();
    let model = FakeModel::default();
    let app = create_test_app(model.clone(), scratch.path());

    let big = vec![b'a'; 16 * 1024 * 1024 + 1];
    let request = Request::builder()
        .method("POST")
        .uri("/predict")
        .header("content-type", "application/json")
        .header("content-length", big.len())
        .body(Body::from(big))
        .unwrap();
    let response = send(app, request).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn test_unknown_route() {
    let scratch = tempfile::tempdir().unwrap();
    let app = create_test_app(FakeModel::default(), scratch.path());
    let response = send(
        app,
        Request::builder().uri("/tts").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
