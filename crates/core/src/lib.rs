pub mod config;
pub mod handlers;
pub mod managers;
pub mod middleware;
pub mod test_utils;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use fleet_shared::FleetError;
use managers::{
    Executor, HealthMonitor, HttpReasoner, Planner, ServiceProxy, ServiceRegistry, SystemMetrics,
};

pub struct AppState {
    pub registry: Arc<ServiceRegistry>,
    pub health: HealthMonitor,
    pub proxy: ServiceProxy,
    pub planner: Planner,
    pub executor: Executor,
    pub metrics: Arc<SystemMetrics>,
    pub config: config::AppConfig,
    pub shutdown: Arc<Notify>,
}

pub enum AppError {
    Fleet(FleetError),
    Internal(anyhow::Error),
    Validation(String),
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let (status, err_type, message, extra) = match self {
            AppError::Fleet(e) => {
                let status = match &e {
                    FleetError::ServiceNotFound(_) => StatusCode::NOT_FOUND,
                    FleetError::Config(_) | FleetError::Validation(_) => StatusCode::BAD_REQUEST,
                    FleetError::Upstream { .. } | FleetError::PlanParse { .. } => {
                        StatusCode::BAD_GATEWAY
                    }
                    FleetError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
                    FleetError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                    FleetError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                let err_type = match &e {
                    FleetError::Config(_) => "ConfigError",
                    FleetError::ServiceNotFound(_) => "ServiceNotFound",
                    FleetError::Upstream { .. } => "UpstreamError",
                    FleetError::Unavailable { .. } => "UpstreamUnavailable",
                    FleetError::Timeout { .. } => "Timeout",
                    FleetError::PlanParse { .. } => "PlanParseError",
                    FleetError::Validation(_) => "ValidationError",
                    FleetError::Internal(_) => "InternalError",
                };
                // Diagnostics the caller needs to act on the failure: the
                // raw reasoning text for an unparsable plan, the upstream
                // payload for an upstream failure.
                let extra = match &e {
                    FleetError::PlanParse { raw, .. } => Some((
                        "raw_analysis",
                        serde_json::Value::String(raw.clone()),
                    )),
                    FleetError::Upstream { body, .. } => Some(("response", body.clone())),
                    _ => None,
                };
                (status, err_type.to_string(), e.to_string(), extra)
            }
            AppError::Internal(e) => {
                // Log full error server-side only; return a generic message
                tracing::error!("Internal error: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "InternalError".to_string(),
                    "An internal error occurred".to_string(),
                    None,
                )
            }
            AppError::Validation(m) => (
                StatusCode::BAD_REQUEST,
                "ValidationError".to_string(),
                m,
                None,
            ),
        };

        let mut error = serde_json::json!({
            "type": err_type,
            "message": message,
        });
        if let Some((key, value)) = extra {
            error[key] = value;
        }

        let body = axum::Json(serde_json::json!({
            "status": "error",
            "error": error,
        }));
        (status, body).into_response()
    }
}

impl From<FleetError> for AppError {
    fn from(err: FleetError) -> Self {
        AppError::Fleet(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// The control-plane surface. Shared by the server entrypoint and the
/// HTTP tests so both exercise the same routes.
pub fn router(state: Arc<AppState>) -> axum::Router {
    use axum::routing::{any, get, post};

    axum::Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/services", get(handlers::get_services))
        .route("/services/health", get(handlers::get_services))
        .route("/reload-config", post(handlers::reload_config))
        .route("/proxy/:service/*path", any(handlers::proxy_handler))
        .route("/execute", post(handlers::execute_handler))
        .route("/commands", get(handlers::get_commands))
        .route("/metrics", get(handlers::get_metrics))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::log_requests,
        ))
        .with_state(state)
}

/// Entrypoint for the control tower server.
pub async fn run_tower(config: config::AppConfig) -> anyhow::Result<()> {
    use tower_http::cors::CorsLayer;
    use tracing::info;

    info!("+---------------------------------------+");
    info!("|          Fleet Control Tower          |");
    info!(
        "|            Version {:<10}         |",
        env!("CARGO_PKG_VERSION")
    );
    info!("+---------------------------------------+");

    // Initial registry load is fatal; there is no last-good snapshot yet.
    let registry = Arc::new(ServiceRegistry::load(&config.services_config)?);

    let proxy = ServiceProxy::new();
    let planner = Planner::new(Arc::new(HttpReasoner::new(&config)));
    let executor = Executor::new(
        proxy.clone(),
        Duration::from_secs(config.step_timeout_secs),
    );
    let shutdown = Arc::new(Notify::new());

    let state = Arc::new(AppState {
        registry,
        health: HealthMonitor::new(),
        proxy,
        planner,
        executor,
        metrics: Arc::new(SystemMetrics::new()),
        config: config.clone(),
        shutdown: shutdown.clone(),
    });

    let app = router(state).layer(
        CorsLayer::new()
            .allow_origin(config.cors_origins.clone())
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::DELETE,
                axum::http::Method::PUT,
            ])
            .allow_headers([axum::http::header::CONTENT_TYPE]),
    );

    let listener =
        tokio::net::TcpListener::bind(format!("{}:{}", config.bind_address, config.port)).await?;
    info!(
        "Fleet control tower listening on http://{}:{}",
        config.bind_address, config.port
    );

    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal.notify_waiters();
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.notified().await;
            info!("Graceful shutdown signal received. Stopping server...");
        })
        .await?;
    Ok(())
}
