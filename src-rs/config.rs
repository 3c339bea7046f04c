use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ServiceError;

/// Settings for the LLM-backed architecture agent.
#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub provider: String,
    pub model: String,
    pub temperature: f64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "gemini-3-flash-preview".to_string(),
            temperature: 0.3,
        }
    }
}

/// Server configuration loaded from environment variables.
///
/// | Env Var                    | Default                                       |
/// |----------------------------|-----------------------------------------------|
/// | `HOST`                     | `0.0.0.0`                                     |
/// | `PORT`                     | `8000`                                        |
/// | `CORS_ORIGINS`             | `http://localhost:5173,http://localhost:3000` |
/// | `DIAGRAMS_DIR`             | `diagrams`                                    |
/// | `FALLBACK_DIAGRAM`         | `sample.png`                                  |
/// | `AGENT_TIMEOUT_SECS`       | `300`                                         |
/// | `ARTIFACT_RETENTION_HOURS` | unset, generated diagrams are kept forever    |
/// | `RETENTION_INTERVAL_SECS`  | `3600`                                        |
/// | `AGENT_PROVIDER`           | `gemini`                                      |
/// | `AGENT_MODEL`              | `gemini-3-flash-preview`                      |
/// | `AGENT_TEMPERATURE`        | `0.3`                                         |
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub diagrams_dir: PathBuf,
    pub fallback_diagram: String,
    pub agent_timeout: Duration,
    pub artifact_retention: Option<Duration>,
    pub retention_interval: Duration,
    pub agent: AgentConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec![
                "http://localhost:5173".to_string(),
                "http://localhost:3000".to_string(),
            ],
            diagrams_dir: PathBuf::from("diagrams"),
            fallback_diagram: "sample.png".to_string(),
            agent_timeout: Duration::from_secs(300),
            artifact_retention: None,
            retention_interval: Duration::from_secs(3600),
            agent: AgentConfig::default(),
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ServiceError> {
        let defaults = Self::default();

        let cors_origins = match env_opt("CORS_ORIGINS") {
            Some(raw) => parse_origins(&raw)?,
            None => defaults.cors_origins,
        };

        let artifact_retention = match env_opt("ARTIFACT_RETENTION_HOURS") {
            Some(raw) => retention_from_hours(parse_value("ARTIFACT_RETENTION_HOURS", &raw)?)?,
            None => defaults.artifact_retention,
        };

        Ok(Self {
            host: env_opt("HOST").unwrap_or(defaults.host),
            port: env_parse("PORT", defaults.port)?,
            cors_origins,
            diagrams_dir: env_opt("DIAGRAMS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.diagrams_dir),
            fallback_diagram: env_opt("FALLBACK_DIAGRAM").unwrap_or(defaults.fallback_diagram),
            agent_timeout: Duration::from_secs(env_parse(
                "AGENT_TIMEOUT_SECS",
                defaults.agent_timeout.as_secs(),
            )?),
            artifact_retention,
            retention_interval: Duration::from_secs(env_parse(
                "RETENTION_INTERVAL_SECS",
                defaults.retention_interval.as_secs(),
            )?),
            agent: AgentConfig {
                provider: env_opt("AGENT_PROVIDER").unwrap_or(defaults.agent.provider),
                model: env_opt("AGENT_MODEL").unwrap_or(defaults.agent.model),
                temperature: env_parse("AGENT_TEMPERATURE", defaults.agent.temperature)?,
            },
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_opt(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
        _ => None,
    }
}

fn env_parse<T: FromStr>(key: &str, fallback: T) -> Result<T, ServiceError> {
    match env_opt(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(fallback),
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T, ServiceError> {
    raw.parse::<T>()
        .map_err(|_| ServiceError::Config(format!("{key} has invalid value {raw:?}")))
}

/// Credentialed CORS needs explicit origins, so `*` is refused.
fn parse_origins(raw: &str) -> Result<Vec<String>, ServiceError> {
    let origins = split_list(raw);
    if origins.iter().any(|origin| origin == "*") {
        return Err(ServiceError::Config(
            "CORS_ORIGINS must list explicit origins, `*` is not allowed".to_string(),
        ));
    }
    Ok(origins)
}

/// Zero disables retention.
fn retention_from_hours(hours: u64) -> Result<Option<Duration>, ServiceError> {
    if hours == 0 {
        return Ok(None);
    }
    hours
        .checked_mul(3600)
        .map(|secs| Some(Duration::from_secs(secs)))
        .ok_or_else(|| {
            ServiceError::Config(format!("ARTIFACT_RETENTION_HOURS is too large: {hours}"))
        })
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}
