//! Common test utilities and helpers for room-api tests

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, Response},
    Router,
};
use room_orchestrator::test_utils::mock_manager;
use room_runtime::mock::MockRuntime;
use tower::ServiceExt;

/// An app over an empty in-memory runtime, plus the runtime handle.
pub fn create_test_app() -> (Router, Arc<MockRuntime>) {
    let (manager, runtime) = mock_manager();
    (room_api::create_app(manager), runtime)
}

/// Helper to extract JSON body from axum response
pub async fn extract_json_body<T>(response: Response<Body>) -> T
where
    T: serde::de::DeserializeOwned,
{
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read response body");

    serde_json::from_slice(&body).expect("Failed to deserialize JSON")
}

pub async fn extract_text_body(response: Response<Body>) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read response body");
    String::from_utf8(body.to_vec()).expect("Body is not UTF-8")
}

/// TestClient to encapsulate API interaction logic
pub struct TestClient {
    pub app: Router,
    pub runtime: Arc<MockRuntime>,
}

impl TestClient {
    pub fn new() -> Self {
        let (app, runtime) = create_test_app();
        Self { app, runtime }
    }

    pub async fn send_request(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(request).await.unwrap()
    }

    /// Post a raw body to an endpoint
    pub async fn post_raw(&self, uri: &str, body: impl Into<Body>) -> Response<Body> {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.into())
            .unwrap();
        self.send_request(request).await
    }

    /// Post JSON to an endpoint
    pub async fn post(&self, uri: &str, body: &serde_json::Value) -> Response<Body> {
        self.post_raw(uri, body.to_string()).await
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.send_request(request).await
    }

    pub async fn delete(&self, uri: &str) -> Response<Body> {
        let request = Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.send_request(request).await
    }
}
