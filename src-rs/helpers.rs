use std::env;
use std::sync::Arc;
use std::time::Duration;

use crate::agent::LlmAgent;
use crate::config::AgentConfig;
use crate::error::ServiceError;
use crate::llm::{GeminiAdapter, GeminiConfig, LLMRouter};

fn load_keys_from_env(primary: &str, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Ok(raw) = env::var(primary) {
        keys.extend(
            raw.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string),
        );
    }
    for idx in 2..=10 {
        if let Ok(value) = env::var(format!("{}_{}", prefix, idx)) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                keys.push(trimmed.to_string());
            }
        }
    }
    keys
}

pub fn load_gemini_keys() -> Vec<String> {
    load_keys_from_env("GEMINI_API_KEY", "GEMINI_API_KEY")
}

/// Registers every provider that has credentials. Fails when the selected
/// provider has none.
pub fn build_llm_router(cfg: &AgentConfig, request_timeout: Duration) -> Result<LLMRouter, ServiceError> {
    let mut router = LLMRouter::new(&cfg.provider);

    let gemini_keys = load_gemini_keys();
    if !gemini_keys.is_empty() {
        let model = if cfg.provider == "gemini" {
            cfg.model.clone()
        } else {
            String::new()
        };
        let adapter = GeminiAdapter::new(GeminiConfig {
            api_keys: gemini_keys,
            base_url: env::var("GEMINI_BASE_URL").unwrap_or_default(),
            model,
            temperature: cfg.temperature,
            request_timeout,
        })
        .map_err(|err| ServiceError::Config(err.to_string()))?;
        router.register_provider("gemini", Arc::new(adapter));
    }

    if !router.has_provider(&cfg.provider) {
        return Err(ServiceError::Config(format!(
            "{} provider selected but no credentials found",
            cfg.provider
        )));
    }
    Ok(router)
}

pub fn build_agent(cfg: &AgentConfig, request_timeout: Duration) -> Result<LlmAgent, ServiceError> {
    let router = build_llm_router(cfg, request_timeout)?;
    Ok(LlmAgent::new(cfg.clone(), router))
}
