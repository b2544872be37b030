use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, RawQuery, State};
use axum::http::{HeaderMap, Method};
use axum::Json;
use serde_json::Value;

use crate::{AppError, AppResult, AppState};

/// ANY /proxy/:service/*path — resolve the service via the registry and
/// forward verb, path, query, headers, and body verbatim. No business
/// logic beyond name resolution and timeout enforcement.
pub async fn proxy_handler(
    State(state): State<Arc<AppState>>,
    Path((service, path)): Path<(String, String)>,
    RawQuery(query): RawQuery,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<Value>> {
    let descriptor = state.registry.lookup(&service)?;

    let payload = if body.is_empty() {
        None
    } else {
        Some(serde_json::from_slice::<Value>(&body).map_err(|e| {
            AppError::Validation(format!("request body must be JSON: {}", e))
        })?)
    };

    state.metrics.proxied_requests.fetch_add(1, Ordering::Relaxed);

    let output = state
        .proxy
        .forward(
            &descriptor,
            method,
            &path,
            query.as_deref(),
            Some(headers),
            payload,
            Duration::from_secs(state.config.proxy_timeout_secs),
        )
        .await?;

    Ok(Json(output))
}
