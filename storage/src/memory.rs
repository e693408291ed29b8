use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::error::StorageError;
use crate::metrics_store::{DeploymentStatus, MetricsStore};
use crate::package::{MAX_PACKAGE_HISTORY_LENGTH, Package, next_label};
use crate::Storage;

/// In-memory store for tests and local single-process deployments.
#[derive(Default)]
pub struct InMemoryStorage {
    deployments: RwLock<HashMap<String, Vec<Package>>>,
    healthy: AtomicBool,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        InMemoryStorage {
            deployments: RwLock::new(HashMap::new()),
            healthy: AtomicBool::new(true),
        }
    }

    pub fn with_history(self, deployment_key: &str, history: Vec<Package>) -> Self {
        self.deployments
            .write()
            .expect("deployments lock poisoned")
            .insert(deployment_key.to_string(), history);
        self
    }

    pub fn create_deployment(&self, deployment_key: &str) {
        self.deployments
            .write()
            .expect("deployments lock poisoned")
            .entry(deployment_key.to_string())
            .or_default();
    }

    /// Appends a release to the deployment's history, assigning the next
    /// label and evicting the oldest entry once the cap is reached.
    pub fn commit_package(
        &self,
        deployment_key: &str,
        mut package: Package,
    ) -> Result<Package, StorageError> {
        let mut deployments = self.deployments.write().expect("deployments lock poisoned");
        let history = deployments
            .get_mut(deployment_key)
            .ok_or(StorageError::NotFound)?;

        package.label = Some(next_label(history));
        history.push(package.clone());
        if history.len() > MAX_PACKAGE_HISTORY_LENGTH {
            history.remove(0);
        }

        Ok(package)
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Relaxed);
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn get_package_history_from_deployment_key(
        &self,
        deployment_key: &str,
    ) -> Result<Vec<Package>, StorageError> {
        self.deployments
            .read()
            .expect("deployments lock poisoned")
            .get(deployment_key)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn check_health(&self) -> Result<(), StorageError> {
        if self.healthy.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err(StorageError::Unavailable("in-memory store marked down".into()))
        }
    }
}

/// In-memory metrics store. Holds per-client active labels and per-label
/// status counters; enough to exercise every status-report flow.
#[derive(Default)]
pub struct InMemoryMetricsStore {
    active_labels: RwLock<HashMap<(String, String), String>>,
    status_counts: RwLock<HashMap<(String, String, DeploymentStatus), u64>>,
    healthy: AtomicBool,
}

impl InMemoryMetricsStore {
    pub fn new() -> Self {
        InMemoryMetricsStore {
            active_labels: RwLock::new(HashMap::new()),
            status_counts: RwLock::new(HashMap::new()),
            healthy: AtomicBool::new(true),
        }
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Relaxed);
    }

    pub fn status_count(
        &self,
        deployment_key: &str,
        label: &str,
        status: DeploymentStatus,
    ) -> u64 {
        self.status_counts
            .read()
            .expect("status counts lock poisoned")
            .get(&(deployment_key.to_string(), label.to_string(), status))
            .copied()
            .unwrap_or(0)
    }

    pub fn active_label(&self, deployment_key: &str, client_unique_id: &str) -> Option<String> {
        self.active_labels
            .read()
            .expect("active labels lock poisoned")
            .get(&(deployment_key.to_string(), client_unique_id.to_string()))
            .cloned()
    }

    fn ensure_healthy(&self) -> Result<(), StorageError> {
        if self.healthy.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err(StorageError::Unavailable("metrics store marked down".into()))
        }
    }
}

#[async_trait]
impl MetricsStore for InMemoryMetricsStore {
    async fn record_update(
        &self,
        deployment_key: &str,
        label: &str,
        _previous_deployment_key: &str,
        _previous_label_or_app_version: Option<&str>,
    ) -> Result<(), StorageError> {
        self.ensure_healthy()?;
        let mut counts = self.status_counts.write().expect("status counts lock poisoned");
        *counts
            .entry((
                deployment_key.to_string(),
                label.to_string(),
                DeploymentStatus::DeploymentSucceeded,
            ))
            .or_insert(0) += 1;
        Ok(())
    }

    async fn increment_label_status_count(
        &self,
        deployment_key: &str,
        label: &str,
        status: DeploymentStatus,
    ) -> Result<(), StorageError> {
        self.ensure_healthy()?;
        let mut counts = self.status_counts.write().expect("status counts lock poisoned");
        *counts
            .entry((deployment_key.to_string(), label.to_string(), status))
            .or_insert(0) += 1;
        Ok(())
    }

    async fn get_current_active_label(
        &self,
        deployment_key: &str,
        client_unique_id: &str,
    ) -> Result<Option<String>, StorageError> {
        self.ensure_healthy()?;
        Ok(self.active_label(deployment_key, client_unique_id))
    }

    async fn update_active_app_for_client(
        &self,
        deployment_key: &str,
        client_unique_id: &str,
        to_label: &str,
        _from_label: Option<&str>,
    ) -> Result<(), StorageError> {
        self.ensure_healthy()?;
        self.active_labels
            .write()
            .expect("active labels lock poisoned")
            .insert(
                (deployment_key.to_string(), client_unique_id.to_string()),
                to_label.to_string(),
            );
        Ok(())
    }

    async fn remove_deployment_key_client_active_label(
        &self,
        deployment_key: &str,
        client_unique_id: &str,
    ) -> Result<(), StorageError> {
        self.ensure_healthy()?;
        self.active_labels
            .write()
            .expect("active labels lock poisoned")
            .remove(&(deployment_key.to_string(), client_unique_id.to_string()));
        Ok(())
    }

    async fn check_health(&self) -> Result<(), StorageError> {
        self.ensure_healthy()
    }
}
