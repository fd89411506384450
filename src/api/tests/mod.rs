use super::*;
use crate::orchestrator::Collaborators;
use crate::orchestrator::test_helpers::{create_test_orchestrator, fake_collaborators};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::time::Duration;
use tower::ServiceExt;

mod catalog;

/// Router over an orchestrator with scripted collaborators.
/// Returns the router, the orchestrator and the tempdir (which must be kept alive).
async fn create_test_app(
    collaborators: Collaborators,
) -> (Router, Arc<RunOrchestrator>, tempfile::TempDir) {
    let (orchestrator, temp_dir) = create_test_orchestrator(collaborators).await;
    let orchestrator = Arc::new(orchestrator);
    let config = Arc::new(orchestrator.config().clone());
    let app = create_router(orchestrator.clone(), config);
    (app, orchestrator, temp_dir)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_api_server_serves_until_shutdown() {
    let (orchestrator, _temp_dir) = create_test_orchestrator(fake_collaborators()).await;
    let mut config = orchestrator.config().clone();
    config.app.host = "127.0.0.1".into();
    config.app.port = 0;

    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(start_api_server(
        Arc::new(orchestrator),
        Arc::new(config),
        async move {
            let _ = rx.await;
        },
    ));

    tokio::time::sleep(Duration::from_millis(100)).await;
    tx.send(()).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server did not stop after shutdown signal")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_cors_enabled() {
    let (orchestrator, _temp_dir) = create_test_orchestrator(fake_collaborators()).await;
    let mut config = orchestrator.config().clone();
    config.api.cors_enabled = true;
    config.api.cors_origins = vec!["*".to_string()];
    let app = create_router(Arc::new(orchestrator), Arc::new(config));

    let request = Request::builder()
        .uri("/api/v1/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers().contains_key("access-control-allow-origin"),
        "CORS header should be present when CORS is enabled"
    );
}

#[tokio::test]
async fn test_cors_disabled() {
    let (orchestrator, _temp_dir) = create_test_orchestrator(fake_collaborators()).await;
    let mut config = orchestrator.config().clone();
    config.api.cors_enabled = false;
    let app = create_router(Arc::new(orchestrator), Arc::new(config));

    let request = Request::builder()
        .uri("/api/v1/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(!response.headers().contains_key("access-control-allow-origin"));
}

#[test]
fn test_cors_layer_with_specific_origins() {
    // Unparseable origins are skipped rather than rejected
    let _layer = build_cors_layer(&[
        "http://localhost:3000".to_string(),
        "bad\norigin".to_string(),
    ]);
}
