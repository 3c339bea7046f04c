use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug)]
pub struct CLIConfig {
    pub base_url: String,
    pub poll_interval: Duration,
    pub verbose: bool,
}

#[derive(Debug, Serialize)]
pub struct GenerateRequest {
    pub requirements: String,
}

#[derive(Debug, Deserialize)]
pub struct StartResponse {
    pub task_id: String,
}

#[derive(Debug, Deserialize)]
pub struct TaskStatus {
    pub task_id: String,
    pub status: String,
    pub progress: u8,
    pub message: String,
    pub data: Option<ResultData>,
    pub error: Option<String>,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self.status.as_str(), "completed" | "failed")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultData {
    pub template: String,
    pub pricing: Pricing,
    pub diagram_id: String,
    pub diagram_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pricing {
    pub total_monthly: f64,
    pub annual: f64,
    pub currency: String,
    pub region: String,
    #[serde(default)]
    pub breakdown: Vec<PricingItem>,
    #[serde(default)]
    pub estimated: bool,
}

#[derive(Debug, Deserialize)]
pub struct PricingItem {
    pub service: String,
    pub cost: f64,
}

#[derive(Debug, Deserialize)]
pub struct CancelResponse {
    pub cancelled: bool,
}
