use std::time::Duration;

use reqwest::Method;
use tracing::{info, warn};

use fleet_shared::{ExecutionReport, ExecutionSummary, Plan, StepResult};

use super::{ServiceProxy, ServiceRegistry};

/// Runs a plan's steps strictly in order against the proxy. Step N+1
/// begins only after step N's outcome is known, so side effects land in a
/// deterministic, reproducible order ("build, then deploy"). A failed
/// step is recorded and execution continues; nothing is rolled back.
pub struct Executor {
    proxy: ServiceProxy,
    step_timeout: Duration,
}

impl Executor {
    #[must_use]
    pub fn new(proxy: ServiceProxy, step_timeout: Duration) -> Self {
        Self {
            proxy,
            step_timeout,
        }
    }

    pub async fn execute(&self, plan: Plan, registry: &ServiceRegistry) -> ExecutionReport {
        let mut results = Vec::with_capacity(plan.steps.len());

        for step in &plan.steps {
            info!(
                service = %step.service,
                endpoint = %step.endpoint,
                method = %step.method,
                "Executing step"
            );

            let descriptor = match registry.lookup(&step.service) {
                Ok(d) => d,
                Err(_) => {
                    warn!(service = %step.service, "Step targets an unregistered service");
                    results.push(StepResult {
                        step: step.clone(),
                        success: false,
                        output: None,
                        error: Some(format!("unknown service: {}", step.service)),
                    });
                    continue;
                }
            };

            let method = match Method::from_bytes(step.method.to_ascii_uppercase().as_bytes()) {
                Ok(m) => m,
                Err(_) => {
                    warn!(service = %step.service, method = %step.method, "Step carries an invalid method");
                    results.push(StepResult {
                        step: step.clone(),
                        success: false,
                        output: None,
                        error: Some(format!("invalid method: {}", step.method)),
                    });
                    continue;
                }
            };

            match self
                .proxy
                .forward(
                    &descriptor,
                    method,
                    &step.endpoint,
                    None,
                    None,
                    Some(step.payload.clone()),
                    self.step_timeout,
                )
                .await
            {
                Ok(output) => results.push(StepResult {
                    step: step.clone(),
                    success: true,
                    output: Some(output),
                    error: None,
                }),
                Err(e) => {
                    warn!(service = %step.service, error = %e, "Step failed");
                    results.push(StepResult {
                        step: step.clone(),
                        success: false,
                        output: None,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        let summary = summarize(&results);
        let counts = ExecutionSummary::tally(&results);
        info!(
            executed = counts.executed,
            succeeded = counts.succeeded,
            "Plan execution finished"
        );

        ExecutionReport {
            plan,
            results,
            summary,
        }
    }
}

/// One line per step in step order: success marker + description, or
/// failure marker + description + error.
#[must_use]
pub fn summarize(results: &[StepResult]) -> String {
    results
        .iter()
        .map(|r| {
            if r.success {
                format!("✅ {}", r.step.description)
            } else {
                format!(
                    "❌ {}: {}",
                    r.step.description,
                    r.error.as_deref().unwrap_or("unknown error")
                )
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
