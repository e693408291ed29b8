//! Composite liveness check. The primary store and the metrics store are
//! redundant signals: either one answering within budget is enough. A
//! configured cache backend is a separately required condition on top.

use std::sync::Arc;
use std::time::Duration;

use shared::counter;
use shared::deadline::with_deadline;
use storage::{MetricsStore, Storage};

use crate::cache::ResponseCache;
use crate::config::Timeouts;
use crate::metrics_defs::HEALTHCHECK_UNHEALTHY;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum HealthError {
    #[error("neither the primary store nor the metrics store answered healthy")]
    StoresUnhealthy,

    #[error("the cache backend did not answer healthy")]
    CacheUnhealthy,
}

pub struct HealthAggregator {
    storage: Arc<dyn Storage>,
    metrics_store: Arc<dyn MetricsStore>,
    cache: Arc<ResponseCache>,
    storage_budget: Duration,
    metrics_budget: Duration,
    cache_budget: Duration,
}

impl HealthAggregator {
    pub fn new(
        storage: Arc<dyn Storage>,
        metrics_store: Arc<dyn MetricsStore>,
        cache: Arc<ResponseCache>,
        timeouts: &Timeouts,
    ) -> Self {
        HealthAggregator {
            storage,
            metrics_store,
            cache,
            storage_budget: Duration::from_millis(timeouts.health_storage_ms),
            metrics_budget: Duration::from_millis(timeouts.health_metrics_ms),
            cache_budget: Duration::from_millis(timeouts.health_cache_ms),
        }
    }

    /// Every sub-check races its own budget; an unresponsive dependency
    /// counts as unhealthy for that sub-check, never as a hang here.
    pub async fn check(&self) -> Result<(), HealthError> {
        let storage_check = with_deadline(
            "primary store",
            self.storage_budget,
            self.storage.check_health(),
        );
        let metrics_check = with_deadline(
            "metrics store",
            self.metrics_budget,
            self.metrics_store.check_health(),
        );
        let cache_check = with_deadline(
            "cache backend",
            self.cache_budget,
            self.cache.check_health(),
        );

        let (storage_result, metrics_result, cache_result) =
            tokio::join!(storage_check, metrics_check, cache_check);

        let storage_healthy = matches!(storage_result, Ok(Ok(())));
        let metrics_healthy = matches!(metrics_result, Ok(Ok(())));

        if !storage_healthy && !metrics_healthy {
            counter!(HEALTHCHECK_UNHEALTHY, "reason" => "stores").increment(1);
            return Err(HealthError::StoresUnhealthy);
        }

        // check_health on an unconfigured cache is vacuously Ok, so this
        // only bites when a backend is actually wired in.
        if !matches!(cache_result, Ok(Ok(()))) {
            counter!(HEALTHCHECK_UNHEALTHY, "reason" => "cache").increment(1);
            return Err(HealthError::CacheUnhealthy);
        }

        Ok(())
    }
}
