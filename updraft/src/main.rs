use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use acquisition::AppState;
use acquisition::cache::{MokaBackend, ResponseCache};
use clap::Parser;
use metrics_exporter_statsd::StatsdBuilder;
use storage::Storage;
use storage::json_file::JsonFileStorage;
use storage::memory::{InMemoryMetricsStore, InMemoryStorage};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod config;
use config::{Config, StorageConfig};

#[derive(Parser)]
#[command(about = "Over-the-air update distribution server")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long, short)]
    config: PathBuf,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = Config::from_file(&cli.config)?;
    config.acquisition.validate()?;

    // Keep the guard alive for the life of the process so queued events
    // flush on shutdown.
    let _sentry_guard = config.common.logging.as_ref().map(|logging| {
        sentry::init((
            logging.sentry_dsn.clone(),
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(sentry::integrations::tracing::layer())
        .init();

    if let Some(metrics_config) = &config.common.metrics {
        let recorder = StatsdBuilder::from(&metrics_config.statsd_host, metrics_config.statsd_port)
            .build(Some("updraft"))?;
        metrics::set_global_recorder(recorder)
            .map_err(|error| format!("failed to install metrics recorder: {error}"))?;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve(config))
}

async fn serve(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let storage: Arc<dyn Storage> = match &config.storage {
        StorageConfig::Memory => {
            tracing::warn!("using in-memory storage; package histories will not persist");
            Arc::new(InMemoryStorage::new())
        }
        StorageConfig::JsonFile { path } => Arc::new(JsonFileStorage::open(path)?),
    };

    let cache = if config.acquisition.cache.enabled {
        ResponseCache::new(
            Some(Arc::new(MokaBackend::new(
                config.acquisition.cache.max_capacity,
            ))),
            Duration::from_millis(config.acquisition.cache.get_timeout_ms),
        )
    } else {
        ResponseCache::disabled()
    };

    let state = AppState {
        storage,
        metrics_store: Arc::new(InMemoryMetricsStore::new()),
        cache: Arc::new(cache),
        config: Arc::new(config.acquisition.clone()),
    };

    acquisition::run(config.acquisition, state).await?;
    Ok(())
}
