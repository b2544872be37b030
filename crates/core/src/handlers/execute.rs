use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use fleet_shared::ExecutionSummary;

use crate::{AppError, AppResult, AppState};

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub context: Value,
}

/// POST /execute — plan the command against the live catalog, run the
/// plan's steps in order with per-step failure isolation, and return the
/// ordered results plus a human-readable summary.
pub async fn execute_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ExecuteRequest>,
) -> AppResult<Json<Value>> {
    if req.command.trim().is_empty() {
        return Err(AppError::Validation("command is required".to_string()));
    }

    info!(command = %req.command, "Received fleet command");

    let plan = state
        .planner
        .plan(&req.command, &req.context, &state.registry)
        .await?;

    let report = state.executor.execute(plan, &state.registry).await;
    let counts = ExecutionSummary::tally(&report.results);
    state.metrics.commands_executed.fetch_add(1, Ordering::Relaxed);

    Ok(Json(json!({
        "success": true,
        "command": req.command,
        "intent": report.plan.intent,
        "reasoning": report.plan.reasoning,
        "actions_executed": counts.executed,
        "succeeded": counts.succeeded,
        "results": report.results,
        "summary": report.summary,
    })))
}
