use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, error};

use fleet_shared::{AgentDescriptor, HealthRecord, HealthSummary};

use super::ServiceRegistry;

/// Fans out liveness probes across the fleet. Each probe is an isolated
/// bounded-time GET against the agent's `/health` endpoint; one slow or
/// dead agent cannot delay or corrupt another's result.
#[derive(Clone)]
pub struct HealthMonitor {
    http: reqwest::Client,
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthMonitor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// One bounded-time liveness probe. Classification:
    /// reachable + well-formed ok body => healthy; reachable but non-ok or
    /// malformed body => unhealthy with best-effort status text;
    /// unreachable or over `timeout` => unhealthy with an explicit reason.
    pub async fn probe(&self, descriptor: &AgentDescriptor, timeout: Duration) -> HealthRecord {
        let url = format!("{}/health", descriptor.url());
        debug!(service = %descriptor.name, url = %url, "Probing agent");

        let result = self.http.get(&url).timeout(timeout).send().await;
        let last_checked = Utc::now();

        match result {
            Ok(resp) => {
                let status_code = resp.status();
                if !status_code.is_success() {
                    return HealthRecord {
                        name: descriptor.name.clone(),
                        healthy: false,
                        status: "offline".to_string(),
                        last_checked,
                        error: Some(format!("health endpoint returned {}", status_code)),
                    };
                }
                match resp.json::<Value>().await {
                    Ok(body) => classify_body(&descriptor.name, &body, last_checked),
                    Err(e) => HealthRecord {
                        name: descriptor.name.clone(),
                        healthy: false,
                        status: "offline".to_string(),
                        last_checked,
                        error: Some(format!("malformed health payload: {}", e)),
                    },
                }
            }
            Err(e) if e.is_timeout() => HealthRecord {
                name: descriptor.name.clone(),
                healthy: false,
                status: "offline".to_string(),
                last_checked,
                error: Some(format!("timeout after {}ms", timeout.as_millis())),
            },
            Err(e) => HealthRecord {
                name: descriptor.name.clone(),
                healthy: false,
                status: "offline".to_string(),
                last_checked,
                error: Some(e.to_string()),
            },
        }
    }

    /// One probe per registered agent, dispatched concurrently. Returns
    /// once every probe has settled; total wall time is bounded by the
    /// single slowest probe, not the sum. Always yields exactly one
    /// record per descriptor, even if a probe task panics.
    pub async fn probe_all(
        &self,
        registry: &ServiceRegistry,
        timeout: Duration,
    ) -> HashMap<String, HealthRecord> {
        use futures::stream::{FuturesUnordered, StreamExt};

        let descriptors = registry.enumerate();
        let mut futures = FuturesUnordered::new();
        for descriptor in &descriptors {
            let monitor = self.clone();
            let descriptor = descriptor.clone();
            futures.push(tokio::spawn(async move {
                monitor.probe(&descriptor, timeout).await
            }));
        }

        let mut records = HashMap::with_capacity(descriptors.len());
        while let Some(joined) = futures.next().await {
            match joined {
                Ok(record) => {
                    records.insert(record.name.clone(), record);
                }
                Err(e) => {
                    error!(error = %e, "Health probe task panicked");
                }
            }
        }

        // A panicked probe still owes its agent a record.
        for descriptor in descriptors {
            records.entry(descriptor.name.clone()).or_insert_with(|| HealthRecord {
                name: descriptor.name,
                healthy: false,
                status: "offline".to_string(),
                last_checked: Utc::now(),
                error: Some("probe task failed".to_string()),
            });
        }
        records
    }
}

fn classify_body(
    name: &str,
    body: &Value,
    last_checked: chrono::DateTime<Utc>,
) -> HealthRecord {
    let status_text = body
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or("online")
        .to_string();

    // An explicit negative signal wins over the presence of a status field.
    let explicitly_down = body.get("ok").and_then(Value::as_bool) == Some(false)
        || body.get("healthy").and_then(Value::as_bool) == Some(false);

    let has_ok_signal = body.get("status").map(Value::is_string) == Some(true)
        || body.get("ok").and_then(Value::as_bool) == Some(true)
        || body.get("healthy").and_then(Value::as_bool) == Some(true);

    if explicitly_down {
        HealthRecord {
            name: name.to_string(),
            healthy: false,
            status: status_text,
            last_checked,
            error: Some("agent reported itself unhealthy".to_string()),
        }
    } else if has_ok_signal {
        HealthRecord {
            name: name.to_string(),
            healthy: true,
            status: status_text,
            last_checked,
            error: None,
        }
    } else {
        HealthRecord {
            name: name.to_string(),
            healthy: false,
            status: "offline".to_string(),
            last_checked,
            error: Some("health payload carries no ok signal".to_string()),
        }
    }
}

/// Pure counting over a probe cycle's records, no side effects.
#[must_use]
pub fn aggregate_summary(records: &HashMap<String, HealthRecord>) -> HealthSummary {
    let healthy = records.values().filter(|r| r.healthy).count();
    HealthSummary {
        total: records.len(),
        healthy,
        unhealthy: records.len() - healthy,
    }
}
