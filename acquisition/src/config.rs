use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Cache TTL cannot be 0 seconds")]
    InvalidCacheTtl,
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: "127.0.0.1".into(),
            port: 3000,
        }
    }
}

/// Response cache knobs. The cache is optional: with `enabled: false` every
/// lookup is a miss and every write a no-op.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct CacheConfig {
    pub enabled: bool,
    /// How long a computed update-check decision stays valid.
    pub ttl_seconds: u64,
    pub max_capacity: u64,
    /// Budget for a single cache read; an elapsed budget degrades to a miss.
    pub get_timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            enabled: true,
            ttl_seconds: 60,
            max_capacity: 100_000,
            get_timeout_ms: 100,
        }
    }
}

/// Budgets for every external dependency call. Losing a race against one of
/// these is handled the same as the dependency returning an error.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Timeouts {
    /// Metrics-store calls on the status-report path.
    pub metrics_store_ms: u64,
    /// Primary-store sub-check on the health path.
    pub health_storage_ms: u64,
    /// Metrics-store sub-check on the health path.
    pub health_metrics_ms: u64,
    /// Cache sub-check on the health path.
    pub health_cache_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            metrics_store_ms: 100,
            health_storage_ms: 1000,
            health_metrics_ms: 30,
            health_cache_ms: 30,
        }
    }
}

/// Acquisition server configuration. Read-only after startup.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub listener: Listener,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub timeouts: Timeouts,
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.listener.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        if self.cache.enabled && self.cache.ttl_seconds == 0 {
            return Err(ValidationError::InvalidCacheTtl);
        }
        Ok(())
    }
}
