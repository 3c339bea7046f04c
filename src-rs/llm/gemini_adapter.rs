use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::rotation::Rotator;
use super::types::{CompletionRequest, LLMResponse, Message, ProviderAdapter, ProviderError};

const GEMINI_ALLOWED_MODELS: [&str; 2] = ["gemini-3-flash-preview", "gemini-3-pro-preview"];
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub struct GeminiConfig {
    pub api_keys: Vec<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f64,
    /// Per-request HTTP timeout. The generation service applies its own
    /// overall bound on top of this.
    pub request_timeout: Duration,
}

pub struct GeminiAdapter {
    cfg: GeminiConfig,
    rotator: Rotator,
    client: Client,
}

impl GeminiAdapter {
    pub fn new(mut cfg: GeminiConfig) -> Result<Self, ProviderError> {
        if cfg.base_url.is_empty() {
            cfg.base_url = DEFAULT_BASE_URL.to_string();
        }
        if cfg.model.is_empty() {
            cfg.model = GEMINI_ALLOWED_MODELS[0].to_string();
        }
        if cfg.temperature == 0.0 {
            cfg.temperature = 0.3;
        }
        let client = Client::builder()
            .timeout(cfg.request_timeout)
            .build()
            .map_err(|err| ProviderError::new("client_error", &err.to_string(), false))?;
        Ok(Self {
            rotator: Rotator::new(cfg.api_keys.clone()),
            cfg,
            client,
        })
    }
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    async fn complete(&self, request: CompletionRequest) -> Result<LLMResponse, ProviderError> {
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.cfg.model.clone());
        if !GEMINI_ALLOWED_MODELS.iter().any(|m| *m == model) {
            return Err(ProviderError::new(
                "invalid_model",
                &format!("model not allowed: {}", model),
                false,
            ));
        }
        let temperature = request.temperature.unwrap_or(self.cfg.temperature);
        let payload = build_payload(&request.messages, temperature);

        let tries = self.rotator.len();
        if tries == 0 {
            return Err(ProviderError::new("auth_error", "no Gemini API keys", false));
        }
        let mut last_err = None;
        for attempt in 0..tries {
            let Some(key) = self.rotator.next() else {
                break;
            };
            match send_request(&self.client, &self.cfg.base_url, &model, key, &payload).await {
                Ok(resp) => return Ok(resp),
                Err(err) if err.retryable => {
                    tracing::warn!(attempt, code = %err.code, "gemini request failed, rotating key");
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_err.unwrap_or_else(|| ProviderError::new("api_error", "request failed", true)))
    }
}

fn build_payload(messages: &[Message], temperature: f64) -> Value {
    let mut contents = Vec::new();
    let mut system_instruction = None;

    for msg in messages {
        if msg.role == "system" {
            system_instruction = Some(msg.content.clone());
            continue;
        }
        let role = if msg.role == "user" { "user" } else { "model" };
        contents.push(json!({
            "role": role,
            "parts": [{"text": msg.content}]
        }));
    }

    let mut payload = json!({
        "contents": contents,
        "generationConfig": {
            "temperature": temperature
        }
    });

    if let Some(system) = system_instruction {
        payload["systemInstruction"] = json!({
            "parts": [{"text": system}]
        });
    }

    payload
}

async fn send_request(
    client: &Client,
    base_url: &str,
    model: &str,
    api_key: &str,
    payload: &Value,
) -> Result<LLMResponse, ProviderError> {
    let endpoint = format!(
        "{}/v1beta/models/{}:generateContent",
        base_url.trim_end_matches('/'),
        model
    );
    let resp = client
        .post(endpoint)
        .header("Content-Type", "application/json")
        .header("x-goog-api-key", api_key)
        .json(payload)
        .send()
        .await
        .map_err(|err| {
            let code = if err.is_timeout() { "timeout" } else { "network_error" };
            ProviderError::new(code, &err.to_string(), true)
        })?;

    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    if status.is_client_error() || status.is_server_error() {
        return Err(classify_error(status.as_u16(), &body));
    }

    let raw: Value = serde_json::from_str(&body)
        .map_err(|_| ProviderError::new("parse_error", "invalid json", false))?;
    Ok(LLMResponse {
        content: response_text(&raw),
        raw: Some(raw),
    })
}

fn classify_error(status: u16, body: &str) -> ProviderError {
    let lowered = body.to_lowercase();
    if status == 401 || status == 403 {
        return ProviderError::new("auth_error", body, true);
    }
    if status == 429 || lowered.contains("quota") || lowered.contains("resource_exhausted") {
        return ProviderError::new("rate_limit", body, true);
    }
    if status >= 500 {
        return ProviderError::new("server_error", body, true);
    }
    ProviderError::new("api_error", body, false)
}

/// Concatenates the text parts of the first candidate.
fn response_text(raw: &Value) -> String {
    raw.pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default()
}
