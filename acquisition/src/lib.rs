//! Update-check resolution and caching pipeline: resolves the package a
//! polling client should receive, applies staged-rollout cohort selection,
//! and serves decisions from a bounded-latency cache. Status reports and
//! the composite health check live here too.

pub mod api;
pub mod cache;
pub mod config;
pub mod errors;
pub mod health;
pub mod metrics_defs;
pub mod resolver;
pub mod rollout;
pub mod types;
pub mod version;

#[cfg(test)]
pub(crate) mod testutils;

use std::sync::Arc;

use storage::{MetricsStore, Storage};

use crate::cache::ResponseCache;
use crate::config::Config;
use crate::errors::AcquisitionError;

/// Everything a request handler needs; constructed once at startup and
/// cloned per request. No ambient globals.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub metrics_store: Arc<dyn MetricsStore>,
    pub cache: Arc<ResponseCache>,
    pub config: Arc<Config>,
}

pub async fn run(config: Config, state: AppState) -> Result<(), AcquisitionError> {
    let addr = format!("{}:{}", config.listener.host, config.listener.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "acquisition server listening");

    let app = api::router(state);
    axum::serve(listener, app).await?;
    Ok(())
}
