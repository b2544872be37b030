use std::time::Duration;

use reqwest::header::{HeaderMap, CONTENT_LENGTH, HOST};
use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use fleet_shared::{AgentDescriptor, FleetError, FleetResult};

/// Stateless transport adapter. Forwards a request to an agent verbatim,
/// adding only the resolved base address and a timeout. Single attempt,
/// no retry, no payload inspection.
#[derive(Clone)]
pub struct ServiceProxy {
    http: reqwest::Client,
}

impl Default for ServiceProxy {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceProxy {
    #[must_use]
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    pub async fn forward(
        &self,
        descriptor: &AgentDescriptor,
        method: Method,
        path: &str,
        query: Option<&str>,
        headers: Option<HeaderMap>,
        body: Option<Value>,
        timeout: Duration,
    ) -> FleetResult<Value> {
        validate_path(path)?;

        let mut target = format!("{}/{}", descriptor.url(), path.trim_start_matches('/'));
        if let Some(q) = query {
            if !q.is_empty() {
                target.push('?');
                target.push_str(q);
            }
        }

        debug!(service = %descriptor.name, method = %method, target = %target, "Forwarding request");

        let mut req = self.http.request(method, &target).timeout(timeout);
        if let Some(mut h) = headers {
            // The target address differs from the original request's.
            h.remove(HOST);
            h.remove(CONTENT_LENGTH);
            req = req.headers(h);
        }
        if let Some(b) = body {
            req = req.json(&b);
        }

        match req.send().await {
            Ok(resp) => {
                let status = resp.status();
                let text = resp.text().await.map_err(|e| FleetError::Unavailable {
                    service: descriptor.name.clone(),
                    message: format!("failed to read response body: {}", e),
                })?;
                let payload: Value =
                    serde_json::from_str(&text).unwrap_or(Value::String(text));
                if status.is_success() {
                    Ok(payload)
                } else {
                    Err(FleetError::Upstream {
                        service: descriptor.name.clone(),
                        status: status.as_u16(),
                        body: payload,
                    })
                }
            }
            Err(e) if e.is_timeout() => Err(FleetError::Timeout {
                service: descriptor.name.clone(),
                message: format!("no response within {}ms", timeout.as_millis()),
            }),
            Err(e) => Err(FleetError::Unavailable {
                service: descriptor.name.clone(),
                message: e.to_string(),
            }),
        }
    }
}

/// Forwarded paths come from the registry source or from the reasoning
/// backend, neither of which is fully trusted. Service names are always
/// resolved against the registry; on top of that, reject traversal
/// segments and embedded schemes before building the target URL.
fn validate_path(path: &str) -> FleetResult<()> {
    if path.split('/').any(|seg| seg == "..") {
        return Err(FleetError::Validation(format!(
            "path '{}' contains a traversal segment",
            path
        )));
    }
    if path.contains("://") {
        return Err(FleetError::Validation(format!(
            "path '{}' embeds a URL scheme",
            path
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_traversal_is_rejected() {
        assert!(validate_path("../admin").is_err());
        assert!(validate_path("a/../b").is_err());
        assert!(validate_path("screenshot").is_ok());
        assert!(validate_path("files/read").is_ok());
    }

    #[test]
    fn embedded_scheme_is_rejected() {
        assert!(validate_path("http://evil.example/steal").is_err());
    }
}
