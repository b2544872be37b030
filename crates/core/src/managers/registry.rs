use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use serde::Deserialize;
use tracing::info;

use fleet_shared::{AgentDescriptor, FleetError, FleetResult};

#[derive(Debug, Deserialize)]
struct ServicesFile {
    #[serde(default)]
    services: HashMap<String, ServiceEntry>,
}

#[derive(Debug, Deserialize)]
struct ServiceEntry {
    base_url: String,
    port: u16,
    #[serde(default)]
    category: String,
    #[serde(default)]
    description: String,
}

/// Immutable catalog of known agents. A reload builds a wholly new
/// snapshot; it is never mutated in place.
#[derive(Debug, Default)]
pub struct RegistrySnapshot {
    services: HashMap<String, AgentDescriptor>,
}

impl RegistrySnapshot {
    fn from_file(path: &Path) -> FleetResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            FleetError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let file: ServicesFile = toml::from_str(&content).map_err(|e| {
            FleetError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        let mut services = HashMap::with_capacity(file.services.len());
        for (name, entry) in file.services {
            if !entry.base_url.starts_with("http://") && !entry.base_url.starts_with("https://") {
                return Err(FleetError::Config(format!(
                    "Service '{}' has invalid base_url '{}': must be http:// or https://",
                    name, entry.base_url
                )));
            }
            services.insert(
                name.clone(),
                AgentDescriptor {
                    name,
                    base_url: entry.base_url,
                    port: entry.port,
                    category: entry.category,
                    description: entry.description,
                },
            );
        }
        Ok(Self { services })
    }
}

/// Read-mostly registry. The current snapshot is published behind a
/// single `Arc`; `reload` builds a fresh snapshot and swaps the `Arc`,
/// so concurrent readers see either the fully-old or fully-new catalog
/// and never block on a reload in progress.
pub struct ServiceRegistry {
    snapshot: RwLock<Arc<RegistrySnapshot>>,
}

impl ServiceRegistry {
    /// Initial load. A failure here is fatal to startup; there is no
    /// previous snapshot to fall back to.
    pub fn load(path: impl AsRef<Path>) -> FleetResult<Self> {
        let snapshot = RegistrySnapshot::from_file(path.as_ref())?;
        info!(services = snapshot.services.len(), "Loaded service registry");
        Ok(Self {
            snapshot: RwLock::new(Arc::new(snapshot)),
        })
    }

    /// Build a registry directly from descriptors (used by tests and tools).
    #[must_use]
    pub fn from_descriptors(descriptors: Vec<AgentDescriptor>) -> Self {
        let services = descriptors
            .into_iter()
            .map(|d| (d.name.clone(), d))
            .collect();
        Self {
            snapshot: RwLock::new(Arc::new(RegistrySnapshot { services })),
        }
    }

    /// Atomically replace the published snapshot. On failure the previous
    /// snapshot remains in effect and the error is returned to the caller.
    pub fn reload(&self, path: impl AsRef<Path>) -> FleetResult<usize> {
        let fresh = Arc::new(RegistrySnapshot::from_file(path.as_ref())?);
        let count = fresh.services.len();
        *self.snapshot.write().expect("registry lock poisoned") = fresh;
        info!(services = count, "Service registry reloaded");
        Ok(count)
    }

    fn current(&self) -> Arc<RegistrySnapshot> {
        self.snapshot.read().expect("registry lock poisoned").clone()
    }

    pub fn lookup(&self, name: &str) -> FleetResult<AgentDescriptor> {
        self.current()
            .services
            .get(name)
            .cloned()
            .ok_or_else(|| FleetError::ServiceNotFound(name.to_string()))
    }

    /// All descriptors in the current snapshot, order insignificant.
    #[must_use]
    pub fn enumerate(&self) -> Vec<AgentDescriptor> {
        self.current().services.values().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.current().services.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
