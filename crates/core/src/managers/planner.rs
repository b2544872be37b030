use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde_json::{json, Value};
use tracing::{debug, info};

use fleet_shared::{AgentDescriptor, FleetError, FleetResult, Plan, ReasoningEngine};

use crate::config::AppConfig;
use super::ServiceRegistry;

/// Production [`ReasoningEngine`]: posts an OpenAI-style chat-completions
/// request to the configured backend and returns the first message's text.
pub struct HttpReasoner {
    http: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
}

impl HttpReasoner {
    #[must_use]
    pub fn new(config: &AppConfig) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(config.llm_timeout_secs))
                .build()
                .expect("Failed to create HTTP client"),
            api_url: config.llm_api_url.clone(),
            api_key: config.llm_api_key.clone(),
            model: config.llm_model.clone(),
            max_tokens: config.llm_max_tokens,
        }
    }
}

#[async_trait::async_trait]
impl ReasoningEngine for HttpReasoner {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        let payload = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let mut req = self.http.post(&self.api_url);
        if let Some(ref key) = self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let resp = req
            .json(&payload)
            .send()
            .await
            .context("Failed to reach reasoning backend")?;
        let status = resp.status();
        let body: Value = resp
            .json()
            .await
            .context("Failed to parse reasoning backend response")?;
        if !status.is_success() {
            anyhow::bail!("Reasoning backend returned {}: {}", status, body);
        }

        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Reasoning response carries no message content"))?;
        Ok(content.to_string())
    }
}

/// Converts a natural-language command plus context into an ordered
/// action plan, delegating interpretation to the reasoning engine seeded
/// with the live agent catalog.
pub struct Planner {
    engine: Arc<dyn ReasoningEngine>,
}

impl Planner {
    #[must_use]
    pub fn new(engine: Arc<dyn ReasoningEngine>) -> Self {
        Self { engine }
    }

    /// Does not validate that each step's service exists in the registry;
    /// that check is deferred to the executor so a stale plan degrades to
    /// failed steps instead of a rejected command.
    pub async fn plan(
        &self,
        command: &str,
        context: &Value,
        registry: &ServiceRegistry,
    ) -> FleetResult<Plan> {
        let prompt = build_prompt(command, context, &registry.enumerate());
        debug!(prompt_len = prompt.len(), "Requesting plan from reasoning backend");

        let raw = self
            .engine
            .complete(&prompt)
            .await
            .map_err(|e| FleetError::Internal(format!("reasoning backend: {:#}", e)))?;

        let plan = parse_plan(&raw)?;
        info!(intent = %plan.intent, steps = plan.steps.len(), "Plan produced");
        Ok(plan)
    }
}

fn build_prompt(command: &str, context: &Value, catalog: &[AgentDescriptor]) -> String {
    let mut services = String::new();
    for d in catalog {
        services.push_str(&format!("- {} ({}): {}\n", d.name, d.port, d.description));
    }

    format!(
        r#"You are a planning copilot for a fleet of task-execution services. Analyze this command and determine which services to call and in what order.

Available services:
{services}
Command: "{command}"
Context: {context}

Respond with a JSON object containing:
{{
  "intent": "brief description of what the user wants",
  "actions": [
    {{
      "service": "service-name",
      "endpoint": "/endpoint",
      "method": "POST",
      "payload": {{}},
      "description": "what this step does"
    }}
  ],
  "reasoning": "why these actions were chosen"
}}

Only include actions that are necessary. Be specific with endpoints and payloads. Only reference services from the list above."#
    )
}

/// Parse the backend's textual response into a [`Plan`]. Tolerates a
/// markdown code fence around the JSON; anything else fails with the raw
/// text retained for diagnostics.
fn parse_plan(raw: &str) -> FleetResult<Plan> {
    let candidate = strip_code_fences(raw);
    let plan: Plan =
        serde_json::from_str(candidate).map_err(|e| FleetError::PlanParse {
            message: e.to_string(),
            raw: raw.to_string(),
        })?;

    for (i, step) in plan.steps.iter().enumerate() {
        if step.service.is_empty() || step.endpoint.is_empty() {
            return Err(FleetError::PlanParse {
                message: format!("step {} is missing a service or endpoint", i),
                raw: raw.to_string(),
            });
        }
    }
    Ok(plan)
}

fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the fence's language tag line, then the closing fence.
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    inner.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plan_accepts_plain_json() {
        let raw = r#"{"intent":"x","actions":[{"service":"a","endpoint":"/e","description":"d"}],"reasoning":"r"}"#;
        let plan = parse_plan(raw).unwrap();
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].method, "POST");
    }

    #[test]
    fn parse_plan_accepts_fenced_json() {
        let raw = "```json\n{\"intent\":\"x\",\"actions\":[],\"reasoning\":\"\"}\n```";
        let plan = parse_plan(raw).unwrap();
        assert!(plan.steps.is_empty());
    }

    #[test]
    fn parse_plan_retains_raw_text_on_failure() {
        let raw = "I cannot help with that.";
        match parse_plan(raw) {
            Err(FleetError::PlanParse { raw: kept, .. }) => assert_eq!(kept, raw),
            other => panic!("expected PlanParse, got {:?}", other),
        }
    }

    #[test]
    fn parse_plan_rejects_step_without_endpoint() {
        let raw = r#"{"intent":"x","actions":[{"service":"a","endpoint":"","description":"d"}]}"#;
        assert!(matches!(
            parse_plan(raw),
            Err(FleetError::PlanParse { .. })
        ));
    }

    #[test]
    fn prompt_embeds_live_catalog() {
        let catalog = vec![AgentDescriptor {
            name: "browser-agent".into(),
            base_url: "http://localhost".into(),
            port: 4040,
            category: "dev".into(),
            description: "Screenshots and scraping".into(),
        }];
        let prompt = build_prompt("take a screenshot", &json!({"env": "dev"}), &catalog);
        assert!(prompt.contains("browser-agent (4040): Screenshots and scraping"));
        assert!(prompt.contains(r#"Command: "take a screenshot""#));
        assert!(prompt.contains(r#"{"env":"dev"}"#));
    }
}
