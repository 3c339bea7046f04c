use std::time::Duration;

use thiserror::Error;

use crate::llm::ProviderError;

/// Errors returned synchronously to callers of the generation service.
///
/// Anything that goes wrong after a task exists is recorded on the task
/// instead (see [`AgentError`]).
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("unable to schedule generation: {0}")]
    Scheduling(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn not_found(entity: &'static str, id: &str) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Failures of the external agent call. These end up in a task's `error`
/// field and are never returned across the HTTP boundary directly.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent timed out after {}s", duration.as_secs())]
    Timeout { duration: Duration },

    #[error("generation cancelled")]
    Cancelled,

    #[error("agent provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("malformed agent response: {0}")]
    Malformed(String),

    #[error("generation aborted unexpectedly")]
    Aborted,
}
