pub mod executor;
pub mod health;
pub mod planner;
pub mod proxy;
pub mod registry;

pub use executor::Executor;
pub use health::HealthMonitor;
pub use planner::{HttpReasoner, Planner};
pub use proxy::ServiceProxy;
pub use registry::ServiceRegistry;

pub struct SystemMetrics {
    pub total_requests: std::sync::atomic::AtomicU64,
    pub commands_executed: std::sync::atomic::AtomicU64,
    pub proxied_requests: std::sync::atomic::AtomicU64,
}

impl Default for SystemMetrics {
    fn default() -> Self {
        Self {
            total_requests: std::sync::atomic::AtomicU64::new(0),
            commands_executed: std::sync::atomic::AtomicU64::new(0),
            proxied_requests: std::sync::atomic::AtomicU64::new(0),
        }
    }
}

impl SystemMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}
