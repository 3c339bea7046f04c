use std::sync::Arc;

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::agent::ArchitectureAgent;
use crate::api::handlers::{
    handle_cancel, handle_diagram, handle_generate, handle_health, handle_start, handle_status,
    handle_tasks,
};
use crate::artifact::{retention, ArtifactResolver, ArtifactStore};
use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::task::{GenerationService, TaskRegistry};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: GenerationService,
}

pub fn build_router(state: AppState, cors_origins: &[String]) -> Router {
    let origins: Vec<HeaderValue> = cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) if value == "*" => {
                tracing::warn!("ignoring wildcard CORS origin, credentials require explicit origins");
                None
            }
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE])
        .allow_credentials(true);

    Router::new()
        .route("/", get(handle_health))
        .route("/health", get(handle_health))
        .route("/generate", post(handle_generate))
        .route("/generate/start", post(handle_start))
        .route("/generate/status/{task_id}", get(handle_status))
        .route("/generate/cancel/{task_id}", post(handle_cancel))
        .route("/tasks", get(handle_tasks))
        .route("/diagram/{artifact_id}", get(handle_diagram))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub struct ArchgenServer {
    pub config: ServiceConfig,
    pub service: GenerationService,
}

impl ArchgenServer {
    /// Opens the diagram store and wires the generation service around
    /// `agent`.
    pub async fn new(
        config: ServiceConfig,
        agent: Arc<dyn ArchitectureAgent>,
    ) -> Result<Self, ServiceError> {
        let store = ArtifactStore::open(&config.diagrams_dir, &config.fallback_diagram).await?;
        let service = GenerationService::new(
            Arc::new(TaskRegistry::new()),
            agent,
            Arc::new(ArtifactResolver::new(Arc::new(store))),
            config.agent_timeout,
        );
        Ok(Self { config, service })
    }

    pub fn router(&self) -> Router {
        build_router(
            AppState {
                service: self.service.clone(),
            },
            &self.config.cors_origins,
        )
    }

    /// Serves until `shutdown` is cancelled.
    pub async fn start(&self, shutdown: CancellationToken) -> Result<(), ServiceError> {
        if let Some(max_age) = self.config.artifact_retention {
            tokio::spawn(retention::run(
                self.service.resolver().store().clone(),
                max_age,
                self.config.retention_interval,
                shutdown.clone(),
            ));
        }

        let addr = self.config.bind_addr();
        let listener = TcpListener::bind(&addr).await?;
        tracing::info!(
            addr = %addr,
            agent = self.service.agent_name(),
            diagrams = %self.config.diagrams_dir.display(),
            "archgen listening"
        );
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;
        Ok(())
    }
}
