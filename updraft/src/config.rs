use std::fs::File;
use std::path::PathBuf;

use acquisition::config::Config as AcquisitionConfig;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    pub sentry_dsn: String,
}

#[derive(Debug, Deserialize)]
pub struct CommonConfig {
    pub metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
}

/// Where package histories live.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageConfig {
    /// Non-persistent; for local development only.
    Memory,
    /// A JSON snapshot of deployment histories, loaded once at startup.
    JsonFile { path: PathBuf },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Memory
    }
}

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    pub common: CommonConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
}

impl Config {
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let data = serde_yaml::from_reader(file)?;

        Ok(data)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_tmp_file(s: &str) -> tempfile::NamedTempFile {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        write!(tmp, "{}", s).expect("write yaml");

        tmp
    }

    #[test]
    fn full_config() {
        let yaml = r#"
            logging:
                sentry_dsn: https://key@sentry.example/1
            metrics:
                statsd_host: 127.0.0.1
                statsd_port: 8125
            storage:
                type: json_file
                path: /var/lib/updraft/deployments.json
            acquisition:
                listener:
                    host: 0.0.0.0
                    port: 8080
            "#;
        let tmp = write_tmp_file(yaml);
        let config = Config::from_file(tmp.path()).expect("load config");

        assert_eq!(
            config.storage,
            StorageConfig::JsonFile {
                path: "/var/lib/updraft/deployments.json".into()
            }
        );
        assert_eq!(config.acquisition.listener.port, 8080);
        assert_eq!(
            config.common.metrics.expect("metrics config").statsd_port,
            8125
        );
    }

    #[test]
    fn minimal_config_defaults_to_memory_storage() {
        let tmp = write_tmp_file("{}");
        let config = Config::from_file(tmp.path()).expect("load config");

        assert_eq!(config.storage, StorageConfig::Memory);
        assert!(config.common.logging.is_none());
        assert_eq!(config.acquisition.listener.port, 3000);
        assert!(config.acquisition.cache.enabled);
    }
}
