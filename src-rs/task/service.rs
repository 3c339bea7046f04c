//! Runs generation requests in the background and tracks them in the
//! [`TaskRegistry`].
//!
//! `submit` returns as soon as the task exists. Each task gets one supervised
//! tokio task that owns every later write to its record: milestones while the
//! agent works, then exactly one terminal transition. A panic inside the unit
//! is caught by the supervisor and recorded as a failure.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::store::TaskRegistry;
use super::types::Task;
use crate::agent::ArchitectureAgent;
use crate::artifact::ArtifactResolver;
use crate::error::{AgentError, ServiceError};
use crate::parse;
use crate::result::GenerationResult;

struct Job {
    cancel: CancellationToken,
    done: watch::Receiver<bool>,
}

#[derive(Clone)]
pub struct GenerationService {
    registry: Arc<TaskRegistry>,
    agent: Arc<dyn ArchitectureAgent>,
    resolver: Arc<ArtifactResolver>,
    agent_timeout: Duration,
    jobs: Arc<Mutex<HashMap<String, Job>>>,
}

impl GenerationService {
    pub fn new(
        registry: Arc<TaskRegistry>,
        agent: Arc<dyn ArchitectureAgent>,
        resolver: Arc<ArtifactResolver>,
        agent_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            agent,
            resolver,
            agent_timeout,
            jobs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    pub fn resolver(&self) -> &Arc<ArtifactResolver> {
        &self.resolver
    }

    pub fn agent_name(&self) -> &str {
        self.agent.name()
    }

    /// Creates a task and starts generating in the background.
    pub fn submit(&self, requirements: &str) -> Result<String, ServiceError> {
        let requirements = requirements.trim();
        if requirements.is_empty() {
            return Err(ServiceError::Validation(
                "requirements must not be empty".to_string(),
            ));
        }
        let runtime = Handle::try_current()
            .map_err(|err| ServiceError::Scheduling(err.to_string()))?;

        let task = self.registry.create(requirements);
        let cancel = CancellationToken::new();
        let (done_tx, done_rx) = watch::channel(false);
        self.jobs().insert(
            task.id.clone(),
            Job {
                cancel: cancel.clone(),
                done: done_rx,
            },
        );

        let service = self.clone();
        let id = task.id.clone();
        let requirements = requirements.to_string();
        runtime.spawn(async move {
            let unit = {
                let service = service.clone();
                let id = id.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move { service.run_unit(&id, &requirements, cancel).await })
            };
            if let Err(err) = unit.await {
                tracing::error!(task_id = %id, error = %err, "generation unit aborted");
                service.finish(&id, &cancel, Err(AgentError::Aborted));
            }
            let _ = done_tx.send(true);
            service.jobs().remove(&id);
        });

        tracing::info!(task_id = %task.id, "generation task submitted");
        Ok(task.id)
    }

    pub fn status(&self, id: &str) -> Result<Task, ServiceError> {
        self.registry
            .get(id)
            .ok_or_else(|| ServiceError::not_found("task", id))
    }

    pub fn list(&self, limit: usize) -> Vec<Task> {
        self.registry.list(limit)
    }

    /// Asks the unit running `id` to stop. Returns `false` when the task has
    /// already finished.
    pub fn cancel(&self, id: &str) -> Result<bool, ServiceError> {
        let jobs = self.jobs();
        let task = self.status(id)?;
        if task.status.is_terminal() {
            return Ok(false);
        }
        match jobs.get(id) {
            Some(job) => {
                job.cancel.cancel();
                tracing::info!(task_id = %id, "cancellation requested");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Resolves once `id` has reached a terminal state.
    pub async fn wait(&self, id: &str) -> Result<Task, ServiceError> {
        let done = self.jobs().get(id).map(|job| job.done.clone());
        if let Some(mut done) = done {
            let _ = done.wait_for(|finished| *finished).await;
        }
        self.status(id)
    }

    /// Submits and waits for the outcome.
    pub async fn generate(&self, requirements: &str) -> Result<Task, ServiceError> {
        let id = self.submit(requirements)?;
        self.wait(&id).await
    }

    async fn run_unit(&self, id: &str, requirements: &str, cancel: CancellationToken) {
        let outcome = self.produce(id, requirements, &cancel).await;
        self.finish(id, &cancel, outcome);
    }

    /// Records the terminal state. Runs under the jobs lock, as does
    /// [`cancel`](Self::cancel): once a cancel has been acknowledged the task
    /// always ends cancelled.
    fn finish(
        &self,
        id: &str,
        cancel: &CancellationToken,
        outcome: Result<GenerationResult, AgentError>,
    ) {
        let _jobs = self.jobs();
        let outcome = if cancel.is_cancelled() {
            Err(AgentError::Cancelled)
        } else {
            outcome
        };
        match outcome {
            Ok(result) => match self.registry.complete(id, result) {
                Ok(task) => tracing::info!(
                    task_id = %id,
                    diagram_id = %task.result.as_ref().map_or("", |r| r.diagram_id.as_str()),
                    "generation completed"
                ),
                Err(err) => tracing::warn!(task_id = %id, error = %err, "could not record result"),
            },
            Err(err) => {
                tracing::warn!(task_id = %id, error = %err, "generation failed");
                if let Err(err) = self.registry.fail(id, &err.to_string()) {
                    tracing::warn!(task_id = %id, error = %err, "could not record failure");
                }
            }
        }
    }

    async fn produce(
        &self,
        id: &str,
        requirements: &str,
        cancel: &CancellationToken,
    ) -> Result<GenerationResult, AgentError> {
        self.milestone(id, 10, "Connecting to architecture agent");
        self.milestone(id, 20, "Generating architecture with agent");

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AgentError::Cancelled),
            outcome = tokio::time::timeout(self.agent_timeout, self.agent.run(requirements)) => {
                match outcome {
                    Ok(response) => response?,
                    Err(_) => return Err(AgentError::Timeout { duration: self.agent_timeout }),
                }
            }
        };
        if response.trim().is_empty() {
            return Err(AgentError::Malformed("agent returned an empty response".to_string()));
        }

        self.milestone(id, 70, "Parsing CloudFormation template");
        let template = parse::extract_template(&response);

        self.milestone(id, 80, "Computing pricing estimate");
        let pricing = parse::extract_pricing(&response);

        self.milestone(id, 90, "Extracting architecture diagram");
        let diagram_id = self.resolver.extract(&response).await;

        Ok(GenerationResult {
            template,
            pricing,
            diagram_id,
        })
    }

    fn milestone(&self, id: &str, progress: u8, message: &str) {
        match self.registry.advance(id, progress, message) {
            Ok(_) => tracing::debug!(task_id = %id, progress, message, "generation progress"),
            Err(err) => tracing::warn!(task_id = %id, error = %err, "progress update rejected"),
        }
    }

    fn jobs(&self) -> MutexGuard<'_, HashMap<String, Job>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
