use std::sync::Arc;

use crate::relay::RelayEngine;
use crate::rooms::RoomRegistry;
use crate::ws::connections::ConnectionManager;

const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 30 * 60;
const DEFAULT_EVICT_INTERVAL_SECS: u64 = 60;

#[derive(Clone)]
pub struct Config {
    pub bind_address: String,
    pub idle_timeout_secs: u64,
    pub evict_interval_secs: u64,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let idle_timeout_secs = env_u64("ROOM_IDLE_TIMEOUT_SECS", DEFAULT_IDLE_TIMEOUT_SECS);
        let evict_interval_secs = env_u64("EVICT_INTERVAL_SECS", DEFAULT_EVICT_INTERVAL_SECS);

        Ok(Config {
            bind_address,
            idle_timeout_secs,
            evict_interval_secs,
        })
    }

    /// Idle cutoff as a chrono duration for registry arithmetic.
    pub fn idle_timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.idle_timeout_secs as i64)
    }

    pub fn evict_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.evict_interval_secs)
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(value) => value.parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring unparseable {}={}, using {}", key, value, default);
            default
        }),
        Err(_) => default,
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub registry: Arc<RoomRegistry>,
    pub relay: Arc<RelayEngine>,
    pub connections: Arc<ConnectionManager>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let registry = Arc::new(RoomRegistry::new());
        let relay = Arc::new(RelayEngine::new(registry.clone()));
        let connections = Arc::new(ConnectionManager::new());

        Self {
            config,
            registry,
            relay,
            connections,
        }
    }
}
