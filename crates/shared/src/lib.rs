use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Descriptor of one managed agent in the fleet.
/// Immutable once published; a registry reload produces fresh descriptors
/// rather than mutating existing ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub name: String,
    pub base_url: String,
    pub port: u16,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
}

impl AgentDescriptor {
    /// Full base address of the agent (scheme + host + port).
    #[must_use]
    pub fn url(&self) -> String {
        format!("{}:{}", self.base_url.trim_end_matches('/'), self.port)
    }
}

/// Outcome of one liveness probe. Recomputed on every probe cycle and
/// never partially updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthRecord {
    pub name: String,
    pub healthy: bool,
    pub status: String,
    pub last_checked: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSummary {
    pub total: usize,
    pub healthy: usize,
    pub unhealthy: usize,
}

fn default_method() -> String {
    "POST".to_string()
}

fn empty_payload() -> Value {
    Value::Object(serde_json::Map::new())
}

/// One proposed agent call inside a [`Plan`]. The serde aliases accept the
/// reasoning backend's native field names (`actions[].data`) as well as
/// our own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionStep {
    pub service: String,
    pub endpoint: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default = "empty_payload", alias = "data")]
    pub payload: Value,
    pub description: String,
}

/// Ordered action plan derived from a natural-language command.
/// Step order is authoritative and preserved through execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub intent: String,
    #[serde(alias = "actions")]
    pub steps: Vec<ActionStep>,
    #[serde(default)]
    pub reasoning: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step: ActionStep,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Ordered outcomes of executing a [`Plan`]. `results` is exactly as long
/// as `plan.steps` and in the same order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub plan: Plan,
    pub results: Vec<StepResult>,
    pub summary: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub executed: usize,
    pub succeeded: usize,
}

impl ExecutionSummary {
    #[must_use]
    pub fn tally(results: &[StepResult]) -> Self {
        Self {
            executed: results.len(),
            succeeded: results.iter().filter(|r| r.success).count(),
        }
    }
}

#[derive(Debug, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail")]
pub enum FleetError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Service not found: {0}")]
    ServiceNotFound(String),
    #[error("Upstream error from '{service}' (status {status})")]
    Upstream {
        service: String,
        status: u16,
        body: Value,
    },
    #[error("Service '{service}' unavailable: {message}")]
    Unavailable { service: String, message: String },
    #[error("Timeout calling '{service}': {message}")]
    Timeout { service: String, message: String },
    #[error("Failed to parse plan: {message}")]
    PlanParse { message: String, raw: String },
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type FleetResult<T> = std::result::Result<T, FleetError>;

/// Single-operation seam to the external reasoning capability: produce
/// plan text from a prompt. The production implementation talks to an
/// LLM API; tests substitute a deterministic stub.
#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn descriptor_url_joins_port() {
        let d = AgentDescriptor {
            name: "file-agent".into(),
            base_url: "http://localhost/".into(),
            port: 4041,
            category: "dev".into(),
            description: "File operations".into(),
        };
        assert_eq!(d.url(), "http://localhost:4041");
    }

    #[test]
    fn action_step_accepts_backend_field_names() {
        let step: ActionStep = serde_json::from_value(json!({
            "service": "git-agent",
            "endpoint": "/commit",
            "data": { "message": "feat: x" },
            "description": "Commit changes"
        }))
        .unwrap();
        assert_eq!(step.method, "POST");
        assert_eq!(step.payload["message"], "feat: x");
    }

    #[test]
    fn plan_accepts_actions_alias() {
        let plan: Plan = serde_json::from_value(json!({
            "intent": "take a screenshot",
            "actions": [{
                "service": "browser-agent",
                "endpoint": "/screenshot",
                "method": "POST",
                "payload": { "url": "https://example.com" },
                "description": "Capture the page"
            }],
            "reasoning": "one call suffices"
        }))
        .unwrap();
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].service, "browser-agent");
    }

    #[test]
    fn plan_rejects_missing_steps() {
        let result: Result<Plan, _> =
            serde_json::from_value(json!({ "intent": "do nothing", "reasoning": "" }));
        assert!(result.is_err());
    }

    #[test]
    fn tally_counts_successes() {
        let step = ActionStep {
            service: "s".into(),
            endpoint: "/x".into(),
            method: "POST".into(),
            payload: json!({}),
            description: "d".into(),
        };
        let results = vec![
            StepResult { step: step.clone(), success: true, output: Some(json!({})), error: None },
            StepResult { step, success: false, output: None, error: Some("boom".into()) },
        ];
        let counts = ExecutionSummary::tally(&results);
        assert_eq!(counts.executed, 2);
        assert_eq!(counts.succeeded, 1);
    }
}
