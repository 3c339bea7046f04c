use serde::{Deserialize, Serialize};

/// Structured output of one successful generation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub template: String,
    pub pricing: Pricing,
    pub diagram_id: String,
}

/// Cost estimate pulled from the agent's answer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pricing {
    pub total_monthly: f64,
    pub annual: f64,
    pub currency: String,
    pub region: String,
    pub breakdown: Vec<PricingItem>,
    /// Set when the agent gave no usable figures and the default estimate
    /// was substituted.
    pub estimated: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricingItem {
    pub service: String,
    pub cost: f64,
    pub kind: String,
    pub description: String,
}

impl Default for Pricing {
    fn default() -> Self {
        Self {
            total_monthly: 0.0,
            annual: 0.0,
            currency: "USD".to_string(),
            region: "us-east-1".to_string(),
            breakdown: Vec::new(),
            estimated: false,
        }
    }
}

impl Pricing {
    /// The placeholder estimate used when no total could be found.
    pub fn default_estimate() -> Self {
        Self {
            total_monthly: 125.0,
            annual: 1500.0,
            breakdown: vec![
                PricingItem {
                    service: "EC2 Instances".to_string(),
                    cost: 75.0,
                    kind: "compute".to_string(),
                    description: "Estimated based on requirements".to_string(),
                },
                PricingItem {
                    service: "Other AWS Services".to_string(),
                    cost: 50.0,
                    kind: "storage".to_string(),
                    description: "Storage, networking, etc.".to_string(),
                },
            ],
            estimated: true,
            ..Self::default()
        }
    }
}
