use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use fleet_core::managers::{Executor, ServiceProxy, ServiceRegistry};
use fleet_core::test_utils::{descriptor, spawn_stub_agent};
use fleet_shared::{ActionStep, Plan};

fn agent_router() -> Router {
    Router::new()
        .route(
            "/echo",
            post(|Json(body): Json<Value>| async move { Json(json!({ "echoed": body })) }),
        )
        .route("/ping", get(|| async { Json(json!({ "pong": true })) }))
        .route(
            "/fail",
            post(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "boom" })),
                )
            }),
        )
}

fn step(service: &str, endpoint: &str, method: &str, desc: &str) -> ActionStep {
    ActionStep {
        service: service.to_string(),
        endpoint: endpoint.to_string(),
        method: method.to_string(),
        payload: json!({ "n": 1 }),
        description: desc.to_string(),
    }
}

fn executor() -> Executor {
    Executor::new(ServiceProxy::new(), Duration::from_secs(5))
}

#[tokio::test]
async fn execute_runs_every_step_in_order_despite_failures() {
    let addr = spawn_stub_agent(agent_router()).await;
    let registry = ServiceRegistry::from_descriptors(vec![descriptor("echo-agent", addr)]);

    let plan = Plan {
        intent: "exercise the fleet".to_string(),
        steps: vec![
            step("ghost", "/anything", "POST", "call a service that does not exist"),
            step("echo-agent", "/echo", "POST", "echo a payload"),
            step("echo-agent", "/fail", "POST", "hit a failing endpoint"),
        ],
        reasoning: "covers all three outcomes".to_string(),
    };

    let report = executor().execute(plan, &registry).await;

    assert_eq!(report.results.len(), 3);
    assert_eq!(report.results[0].step.service, "ghost");
    assert!(!report.results[0].success);
    assert!(report.results[0]
        .error
        .as_deref()
        .unwrap()
        .contains("unknown service"));

    assert!(report.results[1].success);
    assert_eq!(report.results[1].output.as_ref().unwrap()["echoed"]["n"], 1);

    assert!(!report.results[2].success);
    assert!(report.results[2].error.is_some());
}

#[tokio::test]
async fn unknown_service_mid_plan_does_not_halt_execution() {
    // Step 1 targets unregistered "x"; step 2 must still be attempted and
    // reflect its own independent outcome.
    let addr = spawn_stub_agent(agent_router()).await;
    let registry = ServiceRegistry::from_descriptors(vec![descriptor("echo-agent", addr)]);

    let plan = Plan {
        intent: "two steps".to_string(),
        steps: vec![
            step("x", "/whatever", "POST", "first"),
            step("echo-agent", "/echo", "POST", "second"),
        ],
        reasoning: String::new(),
    };

    let report = executor().execute(plan, &registry).await;

    assert_eq!(report.results.len(), 2);
    assert!(!report.results[0].success);
    assert!(report.results[1].success);
}

#[tokio::test]
async fn execute_honors_step_method() {
    let addr = spawn_stub_agent(agent_router()).await;
    let registry = ServiceRegistry::from_descriptors(vec![descriptor("echo-agent", addr)]);

    let plan = Plan {
        intent: "ping".to_string(),
        steps: vec![ActionStep {
            service: "echo-agent".to_string(),
            endpoint: "/ping".to_string(),
            method: "get".to_string(),
            payload: json!({}),
            description: "lowercase verb still works".to_string(),
        }],
        reasoning: String::new(),
    };

    let report = executor().execute(plan, &registry).await;
    assert!(report.results[0].success);
    assert_eq!(report.results[0].output.as_ref().unwrap()["pong"], true);
}

#[tokio::test]
async fn invalid_step_method_fails_that_step_only() {
    let addr = spawn_stub_agent(agent_router()).await;
    let registry = ServiceRegistry::from_descriptors(vec![descriptor("echo-agent", addr)]);

    let plan = Plan {
        intent: "bad verb".to_string(),
        steps: vec![
            step("echo-agent", "/echo", "NOT A VERB", "use a nonsense method"),
            step("echo-agent", "/echo", "POST", "echo normally"),
        ],
        reasoning: String::new(),
    };

    let report = executor().execute(plan, &registry).await;

    assert_eq!(report.results.len(), 2);
    assert!(!report.results[0].success);
    assert!(report.results[0]
        .error
        .as_deref()
        .unwrap()
        .contains("invalid method"));
    assert!(report.results[1].success);
}

#[tokio::test]
async fn report_summary_matches_step_order() {
    let addr = spawn_stub_agent(agent_router()).await;
    let registry = ServiceRegistry::from_descriptors(vec![descriptor("echo-agent", addr)]);

    let plan = Plan {
        intent: "summary".to_string(),
        steps: vec![
            step("echo-agent", "/echo", "POST", "echo something"),
            step("nowhere", "/x", "POST", "fail fast"),
        ],
        reasoning: String::new(),
    };

    let report = executor().execute(plan, &registry).await;
    let lines: Vec<&str> = report.summary.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("✅ echo something"));
    assert!(lines[1].starts_with("❌ fail fast"));
}
