mod common;

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::json;
use tower::ServiceExt;

use common::{
    body_bytes, body_json, build_test_app, build_test_app_with_origins, get,
    poll_until_terminal, post_json, tiny_png, FakeAgent,
};

const SLOW: Duration = Duration::from_secs(30);

fn agent_answer(diagram: &str) -> String {
    format!(
        "Here is your architecture.\n\n```yaml\nAWSTemplateFormatVersion: '2010-09-09'\nResources:\n  Web:\n    Type: AWS::EC2::Instance\n```\n\n\
         - EC2: $30.00/month\n- RDS Database: $45.50/month\n\nTotal: $75.50/month\n\n{diagram}\n"
    )
}

#[tokio::test]
async fn health_reports_agent() {
    let app = build_test_app(FakeAgent::Reply("ok".into()), SLOW).await;
    for uri in ["/", "/health"] {
        let response = get(&app.router, uri).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["agent"], "fake");
    }
}

#[tokio::test]
async fn start_then_poll_to_completion() {
    let payload = STANDARD.encode(tiny_png());
    let answer = agent_answer(&format!("![diagram](data:image/png;base64,{payload})"));
    let app = build_test_app(FakeAgent::Reply(answer), SLOW).await;

    let response = post_json(
        &app.router,
        "/generate/start",
        json!({ "requirements": "A three-tier web app" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let started = body_json(response).await;
    let task_id = started["task_id"].as_str().unwrap().to_string();
    assert!(task_id.starts_with("task_"));

    let snapshots = poll_until_terminal(&app.router, &task_id).await;
    let progress: Vec<u64> = snapshots
        .iter()
        .map(|s| s["progress"].as_u64().unwrap())
        .collect();
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));

    // started, then any number of generating, then one terminal state.
    let ranks: Vec<u8> = snapshots
        .iter()
        .map(|s| match s["status"].as_str().unwrap() {
            "started" => 0,
            "generating" => 1,
            "completed" | "failed" => 2,
            other => panic!("unexpected status {other}"),
        })
        .collect();
    assert!(ranks.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(ranks.iter().filter(|rank| **rank == 2).count(), 1);

    let last = snapshots.last().unwrap();
    assert_eq!(last["status"], "completed");
    assert_eq!(last["progress"], 100);
    assert!(last["completed_at"].is_string());
    assert!(last["error"].is_null());

    let data = &last["data"];
    assert!(data["template"]
        .as_str()
        .unwrap()
        .contains("AWS::EC2::Instance"));
    assert_eq!(data["pricing"]["totalMonthly"], 75.5);
    assert_eq!(data["pricing"]["annual"], 906.0);
    assert_eq!(data["pricing"]["estimated"], false);

    let diagram_id = data["diagramId"].as_str().unwrap();
    assert!(diagram_id.starts_with("architecture_"));
    assert_eq!(data["diagramUrl"], format!("/diagram/{diagram_id}"));

    let response = get(&app.router, &format!("/diagram/{diagram_id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/png");
    assert_eq!(body_bytes(response).await, tiny_png());
}

#[tokio::test]
async fn missing_diagram_falls_back_to_sample() {
    let app = build_test_app(FakeAgent::Reply(agent_answer("No picture, sorry.")), SLOW).await;
    let response = post_json(&app.router, "/generate", json!({ "requirements": "static site" })).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["diagramId"], "sample.png");
    assert!(body["message"].as_str().unwrap().contains("static site"));

    let response = get(&app.router, "/diagram/sample.png").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/png");
    assert!(!body_bytes(response).await.is_empty());
}

#[tokio::test]
async fn referenced_file_is_copied_into_store() {
    let scratch = tempfile::tempdir().unwrap();
    let source = scratch.path().join("generated-diagrams").join("arch.png");
    std::fs::create_dir_all(source.parent().unwrap()).unwrap();
    std::fs::write(&source, tiny_png()).unwrap();

    let answer = agent_answer(&format!("Diagram saved to file://{}", source.display()));
    let app = build_test_app(FakeAgent::Reply(answer), SLOW).await;
    let body = body_json(
        post_json(&app.router, "/generate", json!({ "requirements": "queue worker" })).await,
    )
    .await;
    let diagram_id = body["data"]["diagramId"].as_str().unwrap();
    assert!(diagram_id.starts_with("architecture_"));

    let response = get(&app.router, &format!("/diagram/{diagram_id}")).await;
    assert_eq!(body_bytes(response).await, tiny_png());
    assert!(source.exists());
}

#[tokio::test]
async fn blank_requirements_are_rejected() {
    let app = build_test_app(FakeAgent::Reply("ok".into()), SLOW).await;
    for uri in ["/generate/start", "/generate"] {
        let response = post_json(&app.router, uri, json!({ "requirements": "   " })).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }
    let response = post_json(&app.router, "/generate/start", json!({})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.service.list(10).is_empty());
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let app = build_test_app(FakeAgent::Reply("ok".into()), SLOW).await;

    let response = get(&app.router, "/generate/status/task_0_0").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");

    let response = post_json(&app.router, "/generate/cancel/task_0_0", json!({})).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get(&app.router, "/diagram/architecture_missing.png").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get(&app.router, "/diagram/..%2Fsecret.png").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn agent_failure_surfaces_as_failed_task() {
    let app = build_test_app(FakeAgent::Unreachable, SLOW).await;

    let response = post_json(&app.router, "/generate", json!({ "requirements": "etl" })).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["code"], "GENERATION_FAILED");
    assert!(body["error"].as_str().unwrap().contains("MCP server unreachable"));

    let tasks = app.service.list(1);
    assert_eq!(tasks.len(), 1);
    let snapshot = body_json(get(&app.router, &format!("/generate/status/{}", tasks[0].id)).await).await;
    assert_eq!(snapshot["status"], "failed");
    assert!(snapshot["data"].is_null());
    assert!(snapshot["completed_at"].is_string());
}

#[tokio::test]
async fn slow_agent_times_out() {
    let app = build_test_app(
        FakeAgent::Sleep(Duration::from_secs(5)),
        Duration::from_millis(50),
    )
    .await;
    let started = body_json(
        post_json(&app.router, "/generate/start", json!({ "requirements": "batch" })).await,
    )
    .await;
    let task_id = started["task_id"].as_str().unwrap();

    let last = poll_until_terminal(&app.router, task_id).await.pop().unwrap();
    assert_eq!(last["status"], "failed");
    assert!(last["error"].as_str().unwrap().contains("timed out"));
}

#[tokio::test]
async fn running_task_can_be_cancelled() {
    let app = build_test_app(FakeAgent::Sleep(Duration::from_secs(30)), SLOW).await;
    let started = body_json(
        post_json(&app.router, "/generate/start", json!({ "requirements": "data lake" })).await,
    )
    .await;
    let task_id = started["task_id"].as_str().unwrap().to_string();

    let response = post_json(&app.router, &format!("/generate/cancel/{task_id}"), json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["cancelled"], true);

    let last = poll_until_terminal(&app.router, &task_id).await.pop().unwrap();
    assert_eq!(last["status"], "failed");
    assert_eq!(last["error"], "generation cancelled");

    let body = body_json(
        post_json(&app.router, &format!("/generate/cancel/{task_id}"), json!({})).await,
    )
    .await;
    assert_eq!(body["cancelled"], false);
}

#[tokio::test]
async fn tasks_are_listed_newest_first() {
    let app = build_test_app(FakeAgent::Reply(agent_answer("")), SLOW).await;
    let mut ids = Vec::new();
    for n in 0..3 {
        let started = body_json(
            post_json(
                &app.router,
                "/generate/start",
                json!({ "requirements": format!("service {n}") }),
            )
            .await,
        )
        .await;
        ids.push(started["task_id"].as_str().unwrap().to_string());
    }
    for id in &ids {
        poll_until_terminal(&app.router, id).await;
    }

    let body = body_json(get(&app.router, "/tasks?limit=2").await).await;
    let listed: Vec<&str> = body["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["task_id"].as_str().unwrap())
        .collect();
    assert_eq!(listed, vec![ids[2].as_str(), ids[1].as_str()]);

    let body = body_json(get(&app.router, "/tasks").await).await;
    assert_eq!(body["tasks"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn wildcard_cors_origin_is_skipped() {
    let origins = ["*".to_string(), "http://localhost:5173".to_string()];
    let app = build_test_app_with_origins(FakeAgent::Reply("ok".into()), SLOW, &origins).await;

    let request = Request::builder()
        .uri("/health")
        .header("origin", "http://localhost:5173")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "http://localhost:5173"
    );
}
