use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use fleet_shared::{AgentDescriptor, ReasoningEngine};

use crate::config::AppConfig;
use crate::managers::{
    Executor, HealthMonitor, Planner, ServiceProxy, ServiceRegistry, SystemMetrics,
};
use crate::AppState;

/// Deterministic [`ReasoningEngine`] that returns a canned response and
/// records the prompt it was given.
pub struct StaticReasoner {
    pub response: String,
    pub last_prompt: std::sync::Mutex<Option<String>>,
}

impl StaticReasoner {
    #[must_use]
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            last_prompt: std::sync::Mutex::new(None),
        }
    }
}

#[async_trait::async_trait]
impl ReasoningEngine for StaticReasoner {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
        Ok(self.response.clone())
    }
}

/// Config with short timeouts; never reads the environment, so tests do
/// not race on env vars.
#[must_use]
pub fn test_config() -> AppConfig {
    AppConfig {
        port: 0,
        bind_address: "127.0.0.1".to_string(),
        cors_origins: vec![],
        services_config: "services.toml".to_string(),
        probe_timeout_ms: 500,
        proxy_timeout_secs: 5,
        step_timeout_secs: 5,
        llm_api_url: "http://127.0.0.1:1/v1/chat/completions".to_string(),
        llm_api_key: None,
        llm_model: "test".to_string(),
        llm_timeout_secs: 5,
        llm_max_tokens: 256,
    }
}

pub fn create_test_app_state(
    registry: ServiceRegistry,
    reasoner: Arc<dyn ReasoningEngine>,
) -> Arc<AppState> {
    create_test_app_state_with_config(registry, reasoner, test_config())
}

pub fn create_test_app_state_with_config(
    registry: ServiceRegistry,
    reasoner: Arc<dyn ReasoningEngine>,
    config: AppConfig,
) -> Arc<AppState> {
    let proxy = ServiceProxy::new();
    Arc::new(AppState {
        registry: Arc::new(registry),
        health: HealthMonitor::new(),
        proxy: proxy.clone(),
        planner: Planner::new(reasoner),
        executor: Executor::new(proxy, Duration::from_secs(config.step_timeout_secs)),
        metrics: Arc::new(SystemMetrics::new()),
        config,
        shutdown: Arc::new(Notify::new()),
    })
}

/// Serve an axum router on an ephemeral loopback port, returning its
/// address. The server runs until the test's runtime shuts down.
pub async fn spawn_stub_agent(app: axum::Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    addr
}

#[must_use]
pub fn descriptor(name: &str, addr: SocketAddr) -> AgentDescriptor {
    AgentDescriptor {
        name: name.to_string(),
        base_url: format!("http://{}", addr.ip()),
        port: addr.port(),
        category: "test".to_string(),
        description: format!("{} stub", name),
    }
}
