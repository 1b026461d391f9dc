use std::sync::Arc;
use std::time::Instant;

use tokio::sync::RwLock;

use modis_runner_core::{Config, RegistrySnapshot, SceneRegistries};

/// Shared application state
pub struct AppState {
    config: Arc<Config>,
    registries: Arc<RwLock<SceneRegistries>>,
    version: &'static str,
    started: Instant,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        registries: Arc<RwLock<SceneRegistries>>,
        version: &'static str,
    ) -> Self {
        Self {
            config,
            registries,
            version,
            started: Instant::now(),
        }
    }

    pub fn station(&self) -> &str {
        &self.config.runner.station
    }

    pub fn version(&self) -> &'static str {
        self.version
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    pub async fn snapshot(&self) -> RegistrySnapshot {
        self.registries.read().await.snapshot()
    }
}
