pub mod agent;
pub mod config;
pub mod error;
pub mod helpers;
pub mod parse;
pub mod result;

#[path = "llm/lib.rs"]
pub mod llm;
#[path = "artifact/lib.rs"]
pub mod artifact;
#[path = "task/lib.rs"]
pub mod task;
#[path = "api/lib.rs"]
pub mod api;

pub use agent::{ArchitectureAgent, LlmAgent};
pub use config::{AgentConfig, ServiceConfig};
pub use error::{AgentError, ServiceError};
pub use result::{GenerationResult, Pricing, PricingItem};
