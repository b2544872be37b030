use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, Json};
use serde_json::{json, Value};
use tracing::info;

use crate::managers::health::aggregate_summary;
use crate::{AppResult, AppState};

/// GET /services (and /services/health) — one probe cycle across the
/// fleet, per-agent records merged with their descriptor fields.
pub async fn get_services(State(state): State<Arc<AppState>>) -> AppResult<Json<Value>> {
    let timeout = Duration::from_millis(state.config.probe_timeout_ms);
    let records = state.health.probe_all(&state.registry, timeout).await;
    let summary = aggregate_summary(&records);

    let mut services = serde_json::Map::new();
    for descriptor in state.registry.enumerate() {
        let Some(record) = records.get(&descriptor.name) else {
            continue;
        };
        services.insert(
            descriptor.name.clone(),
            json!({
                "base_url": descriptor.base_url,
                "port": descriptor.port,
                "category": descriptor.category,
                "description": descriptor.description,
                "healthy": record.healthy,
                "status": record.status,
                "last_checked": record.last_checked,
                "error": record.error,
            }),
        );
    }

    Ok(Json(json!({
        "success": true,
        "services": services,
        "total": summary.total,
        "healthy": summary.healthy,
        "unhealthy": summary.unhealthy,
    })))
}

/// POST /reload-config — build-then-swap reload of the registry. On a
/// malformed source the previous snapshot stays in effect and the error
/// is surfaced to the caller.
pub async fn reload_config(State(state): State<Arc<AppState>>) -> AppResult<Json<Value>> {
    let count = state.registry.reload(&state.config.services_config)?;
    info!(services = count, "Configuration reloaded via API");
    Ok(Json(json!({
        "success": true,
        "message": "Configuration reloaded",
        "services": count,
    })))
}
