//! Best-effort extraction of a CloudFormation template and a cost estimate
//! from the agent's free-text answer.
//!
//! Neither extractor fails: when nothing usable is found a built-in
//! placeholder is returned and the substitution is logged.

use std::sync::LazyLock;

use regex::Regex;

use crate::result::{Pricing, PricingItem};

static YAML_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)```yaml\s*(.*?)\s*```").expect("valid regex"));

static CFN_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```\s*(AWSTemplateFormatVersion.*?)\s*```").expect("valid regex")
});

/// Tried in order; the first hit is the monthly total.
static TOTAL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)total[:\s]*\$?(\d+(?:\.\d+)?)[:\s]*(?:per month|monthly|/\s*month)",
        r"(?i)cost[:\s]*\$?(\d+(?:\.\d+)?)[:\s]*(?:per month|monthly|/\s*month)",
        r"(?i)\$(\d+(?:\.\d+)?)[:\s]*(?:per month|monthly|/\s*month)",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid regex"))
    .collect()
});

static SERVICE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)([a-z][a-z0-9 ()./\-]*?)\s*:\s*\$?(\d+(?:\.\d+)?)\s*(?:per month|monthly|/\s*month)",
    )
    .expect("valid regex")
});

const MIN_SCANNED_LINES: usize = 10;

pub const FALLBACK_TEMPLATE: &str = r#"AWSTemplateFormatVersion: '2010-09-09'
Description: 'AWS architecture placeholder'

Parameters:
  Environment:
    Type: String
    Default: prod
    AllowedValues: [dev, staging, prod]

Resources:
  VPC:
    Type: AWS::EC2::VPC
    Properties:
      CidrBlock: 10.0.0.0/16
      EnableDnsHostnames: true
      EnableDnsSupport: true
      Tags:
        - Key: Name
          Value: !Sub '${Environment}-vpc'

  InternetGateway:
    Type: AWS::EC2::InternetGateway
    Properties:
      Tags:
        - Key: Name
          Value: !Sub '${Environment}-igw'

  InternetGatewayAttachment:
    Type: AWS::EC2::VPCGatewayAttachment
    Properties:
      InternetGatewayId: !Ref InternetGateway
      VpcId: !Ref VPC

Outputs:
  VPCId:
    Description: VPC ID
    Value: !Ref VPC
    Export:
      Name: !Sub '${Environment}-vpc-id'
"#;

/// Returns the CloudFormation template embedded in `response`.
pub fn extract_template(response: &str) -> String {
    if let Some(found) = fenced_template(response).or_else(|| scan_template_lines(response)) {
        return found;
    }
    tracing::warn!("no CloudFormation template in agent response, using placeholder");
    FALLBACK_TEMPLATE.to_string()
}

fn fenced_template(response: &str) -> Option<String> {
    YAML_FENCE
        .captures(response)
        .or_else(|| CFN_FENCE.captures(response))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|text| !text.is_empty())
}

/// Collects lines from the first template marker until a blank line once
/// enough lines have been gathered.
fn scan_template_lines(response: &str) -> Option<String> {
    let mut lines = Vec::new();
    let mut in_template = false;
    for line in response.lines() {
        if line.contains("AWSTemplateFormatVersion") || line.contains("Resources:") {
            in_template = true;
        }
        if in_template {
            lines.push(line);
            if line.trim().is_empty() && lines.len() > MIN_SCANNED_LINES {
                break;
            }
        }
    }
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n").trim_end().to_string())
    }
}

/// Returns the pricing figures mentioned in `response`.
pub fn extract_pricing(response: &str) -> Pricing {
    let text = response.replace("**", "");

    let total = TOTAL_PATTERNS.iter().find_map(|pattern| {
        pattern
            .captures(&text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok())
    });

    let total_monthly = match total {
        Some(total) if total > 0.0 => total,
        _ => {
            tracing::warn!("no monthly total in agent response, using default estimate");
            return Pricing::default_estimate();
        }
    };

    Pricing {
        total_monthly,
        annual: total_monthly * 12.0,
        breakdown: service_breakdown(&text),
        ..Pricing::default()
    }
}

fn service_breakdown(text: &str) -> Vec<PricingItem> {
    SERVICE_LINE
        .captures_iter(text)
        .filter_map(|caps| {
            let service = caps.get(1)?.as_str().trim();
            let cost = caps.get(2)?.as_str().parse::<f64>().ok()?;
            if service.len() <= 3 || service.to_lowercase().starts_with("total") {
                return None;
            }
            Some(PricingItem {
                service: service.to_string(),
                cost,
                kind: "service".to_string(),
                description: format!("Monthly cost for {}", service),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_yaml_fence() {
        let response = "Here you go:\n```yaml\nAWSTemplateFormatVersion: '2010-09-09'\nResources: {}\n```\nDone.";
        assert_eq!(
            extract_template(response),
            "AWSTemplateFormatVersion: '2010-09-09'\nResources: {}"
        );
    }

    #[test]
    fn accepts_untagged_fence_starting_with_version() {
        let response = "```\nAWSTemplateFormatVersion: '2010-09-09'\nResources:\n  Bucket: {}\n```";
        assert!(extract_template(response).starts_with("AWSTemplateFormatVersion"));
    }

    #[test]
    fn scans_unfenced_template_lines() {
        let response = "Intro text\nResources:\n  VPC:\n    Type: AWS::EC2::VPC\n";
        assert_eq!(
            extract_template(response),
            "Resources:\n  VPC:\n    Type: AWS::EC2::VPC"
        );
    }

    #[test]
    fn falls_back_to_placeholder_template() {
        assert_eq!(extract_template("no template here"), FALLBACK_TEMPLATE);
    }

    #[test]
    fn reads_total_and_breakdown() {
        let response = "Cost summary\n\
            - Application Load Balancer: $18.50 per month\n\
            - RDS MySQL (db.t3.micro): $15.20 per month\n\
            **Total: $33.70 per month**";
        let pricing = extract_pricing(response);
        assert_eq!(pricing.total_monthly, 33.70);
        assert!((pricing.annual - 404.4).abs() < 1e-9);
        assert!(!pricing.estimated);
        let services: Vec<&str> = pricing.breakdown.iter().map(|i| i.service.as_str()).collect();
        assert_eq!(services, vec!["Application Load Balancer", "RDS MySQL (db.t3.micro)"]);
        assert_eq!(pricing.breakdown[1].cost, 15.20);
    }

    #[test]
    fn default_estimate_when_no_total() {
        let pricing = extract_pricing("This architecture is cheap.");
        assert!(pricing.estimated);
        assert_eq!(pricing.total_monthly, 125.0);
        assert_eq!(pricing.annual, 1500.0);
        assert_eq!(pricing.breakdown.len(), 2);
    }
}
