use async_trait::async_trait;

use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::llm::{CompletionRequest, LLMRouter, Message};

const SYSTEM_PROMPT: &str = "You are an AWS solutions architect. You answer with a CloudFormation \
template, a monthly cost estimate and an architecture diagram.";

/// The external collaborator that turns requirements into a free-text
/// architecture answer.
#[async_trait]
pub trait ArchitectureAgent: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, requirements: &str) -> Result<String, AgentError>;
}

/// Agent backed by an LLM provider through [`LLMRouter`].
pub struct LlmAgent {
    pub config: AgentConfig,
    pub system_prompt: String,
    router: LLMRouter,
}

impl LlmAgent {
    pub fn new(config: AgentConfig, router: LLMRouter) -> Self {
        Self {
            config,
            system_prompt: SYSTEM_PROMPT.to_string(),
            router,
        }
    }
}

#[async_trait]
impl ArchitectureAgent for LlmAgent {
    fn name(&self) -> &str {
        &self.config.provider
    }

    async fn run(&self, requirements: &str) -> Result<String, AgentError> {
        let request = CompletionRequest {
            messages: vec![
                Message::system(&self.system_prompt),
                Message::user(&architecture_prompt(requirements)),
            ],
            temperature: Some(self.config.temperature),
            model: Some(self.config.model.clone()),
            provider: Some(self.config.provider.clone()),
        };
        let response = self.router.complete(request).await?;
        tracing::debug!(chars = response.content.len(), "agent response received");
        Ok(response.content)
    }
}

pub fn architecture_prompt(requirements: &str) -> String {
    format!(
        r#"Generate a complete AWS architecture based on these requirements: "{requirements}"

Please provide:
1. A complete CloudFormation template (YAML format, in a ```yaml fenced block) with all necessary resources
2. A detailed cost estimate with a monthly pricing breakdown
3. An architecture diagram showing the components and their relationships

For the CloudFormation template:
- Include all necessary resources (VPC, subnets, security groups, etc.)
- Use best practices and proper resource naming
- Include outputs for important values

For the pricing:
- Calculate monthly costs for all resources
- Break down costs by service, one "<Service>: $<amount> per month" line each
- State the total as "Total: $<amount> per month"
- Include region and currency information

For the diagram:
- Show data flow and component relationships
- Use standard AWS icons and naming conventions
- Return the image inline as a data:image/png;base64 URI, or the path of the saved image file
"#
    )
}
