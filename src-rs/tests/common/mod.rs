#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use archgen_rs::api::{build_router, AppState};
use archgen_rs::artifact::{ArtifactResolver, ArtifactStore};
use archgen_rs::task::{GenerationService, TaskRegistry};
use archgen_rs::{AgentError, ArchitectureAgent};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

/// Agent double with a canned behaviour.
pub enum FakeAgent {
    Reply(String),
    Sleep(Duration),
    Unreachable,
}

#[async_trait]
impl ArchitectureAgent for FakeAgent {
    fn name(&self) -> &str {
        "fake"
    }

    async fn run(&self, _requirements: &str) -> Result<String, AgentError> {
        match self {
            FakeAgent::Reply(text) => Ok(text.clone()),
            FakeAgent::Sleep(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(String::new())
            }
            FakeAgent::Unreachable => Err(AgentError::Malformed("MCP server unreachable".into())),
        }
    }
}

pub struct TestApp {
    pub router: Router,
    pub service: GenerationService,
    pub dir: tempfile::TempDir,
}

pub async fn build_test_app(agent: FakeAgent, timeout: Duration) -> TestApp {
    build_test_app_with_origins(agent, timeout, &["http://localhost:5173".to_string()]).await
}

pub async fn build_test_app_with_origins(
    agent: FakeAgent,
    timeout: Duration,
    cors_origins: &[String],
) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::open(dir.path().join("diagrams"), "sample.png")
        .await
        .unwrap();
    let service = GenerationService::new(
        Arc::new(TaskRegistry::new()),
        Arc::new(agent),
        Arc::new(ArtifactResolver::new(Arc::new(store))),
        timeout,
    );
    let router = build_router(
        AppState {
            service: service.clone(),
        },
        cors_origins,
    );
    TestApp {
        router,
        service,
        dir,
    }
}

pub fn tiny_png() -> Vec<u8> {
    let mut png = b"\x89PNG\r\n\x1a\n".to_vec();
    png.extend_from_slice(&[0, 0, 0, 13]);
    png.extend_from_slice(b"IHDR\0\0\0\x01\0\0\0\x01\x08\x02\0\0\0\x90wS\xde");
    png.extend_from_slice(b"\0\0\0\0IEND\xAE\x42\x60\x82");
    png
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Polls the status endpoint until the task is terminal, returning every
/// snapshot seen along the way.
pub async fn poll_until_terminal(app: &Router, task_id: &str) -> Vec<Value> {
    let mut seen = Vec::new();
    for _ in 0..500 {
        let response = get(app, &format!("/generate/status/{task_id}")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let snapshot = body_json(response).await;
        let terminal = matches!(snapshot["status"].as_str(), Some("completed" | "failed"));
        seen.push(snapshot);
        if terminal {
            return seen;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("task {task_id} never reached a terminal state");
}
