use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;
use crate::result::GenerationResult;
use crate::task::{Task, TaskStatus};

const DEFAULT_TASK_LIMIT: usize = 10;
const MAX_TASK_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub requirements: String,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub task_id: String,
    pub message: String,
}

/// A generation result plus the URL its diagram is served from.
#[derive(Debug, Serialize)]
pub struct ResultView {
    #[serde(flatten)]
    pub result: GenerationResult,
    #[serde(rename = "diagramUrl")]
    pub diagram_url: String,
}

impl From<GenerationResult> for ResultView {
    fn from(result: GenerationResult) -> Self {
        Self {
            diagram_url: format!("/diagram/{}", result.diagram_id),
            result,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub task_id: String,
    pub status: TaskStatus,
    pub progress: u8,
    pub message: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub data: Option<ResultView>,
    pub error: Option<String>,
}

impl From<Task> for StatusResponse {
    fn from(task: Task) -> Self {
        Self {
            task_id: task.id,
            status: task.status,
            progress: task.progress,
            message: task.message,
            started_at: task.started_at,
            completed_at: task.completed_at,
            data: task.result.map(ResultView::from),
            error: task.error,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub success: bool,
    pub data: ResultView,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub task_id: String,
    pub cancelled: bool,
}

#[derive(Debug, Deserialize, Default)]
pub struct TasksQuery {
    pub limit: Option<usize>,
}

pub async fn handle_health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "agent": state.service.agent_name(),
    }))
}

/// POST /generate/start
pub async fn handle_start(
    State(state): State<AppState>,
    Json(req): Json<GenerateRequest>,
) -> ApiResult<Json<StartResponse>> {
    let task_id = state.service.submit(&req.requirements)?;
    Ok(Json(StartResponse {
        message: format!("Generation started, poll /generate/status/{task_id} for progress"),
        task_id,
    }))
}

/// GET /generate/status/{task_id}
pub async fn handle_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<StatusResponse>> {
    let task = state.service.status(&task_id)?;
    Ok(Json(task.into()))
}

/// POST /generate/cancel/{task_id}
pub async fn handle_cancel(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<CancelResponse>> {
    let cancelled = state.service.cancel(&task_id)?;
    Ok(Json(CancelResponse { task_id, cancelled }))
}

/// POST /generate
///
/// Holds the request open until the task is terminal.
pub async fn handle_generate(
    State(state): State<AppState>,
    Json(req): Json<GenerateRequest>,
) -> ApiResult<Json<GenerateResponse>> {
    let task = state.service.generate(&req.requirements).await?;
    match (task.status, task.result) {
        (TaskStatus::Completed, Some(result)) => Ok(Json(GenerateResponse {
            success: true,
            data: result.into(),
            message: format!("Generated AWS architecture for: {}", preview(&task.requirements)),
        })),
        _ => Err(ApiError::GenerationFailed(
            task.error.unwrap_or_else(|| "unknown error".to_string()),
        )),
    }
}

/// GET /tasks
pub async fn handle_tasks(
    State(state): State<AppState>,
    Query(query): Query<TasksQuery>,
) -> Json<serde_json::Value> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_TASK_LIMIT)
        .min(MAX_TASK_LIMIT);
    let tasks: Vec<StatusResponse> = state
        .service
        .list(limit)
        .into_iter()
        .map(StatusResponse::from)
        .collect();
    Json(json!({ "tasks": tasks }))
}

/// GET /diagram/{artifact_id}
pub async fn handle_diagram(
    State(state): State<AppState>,
    Path(artifact_id): Path<String>,
) -> ApiResult<Response> {
    let artifact = state.service.resolver().store().get(&artifact_id).await?;
    Ok(([(header::CONTENT_TYPE, artifact.content_type)], artifact.bytes).into_response())
}

fn preview(text: &str) -> String {
    const LIMIT: usize = 50;
    match text.char_indices().nth(LIMIT) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
