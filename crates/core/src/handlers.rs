pub mod execute;
pub mod fleet;
pub mod proxy;

use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::AppState;

pub use execute::execute_handler;
pub use fleet::{get_services, reload_config};
pub use proxy::proxy_handler;

/// GET /health — process-level liveness, not agent health.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "fleet-tower",
        "version": env!("CARGO_PKG_VERSION"),
        "port": state.config.port,
    }))
}

/// GET /metrics
pub async fn get_metrics(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "total_requests": state.metrics.total_requests.load(Ordering::Relaxed),
        "commands_executed": state.metrics.commands_executed.load(Ordering::Relaxed),
        "proxied_requests": state.metrics.proxied_requests.load(Ordering::Relaxed),
        "registered_services": state.registry.len(),
    }))
}

/// GET /commands — example commands plus the live service names.
pub async fn get_commands(State(state): State<Arc<AppState>>) -> Json<Value> {
    let available: Vec<String> = state
        .registry
        .enumerate()
        .into_iter()
        .map(|d| d.name)
        .collect();

    let examples = json!([
        { "command": "Take a screenshot of example.com and save it as homepage.png" },
        { "command": "Create a new file called README.md with project documentation" },
        { "command": "Commit all changes with message 'feat: add new feature' and push" },
        { "command": "Run the test suite and deploy if it passes" },
        { "command": "Start a container with nginx and map port 8080" },
    ]);

    Json(json!({
        "success": true,
        "examples": examples,
        "available_services": available,
    }))
}
