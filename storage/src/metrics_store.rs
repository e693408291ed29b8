use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Client-reported outcome of applying or fetching a release.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeploymentStatus {
    DeploymentSucceeded,
    DeploymentFailed,
    Downloaded,
}

impl DeploymentStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "DeploymentSucceeded" => Some(DeploymentStatus::DeploymentSucceeded),
            "DeploymentFailed" => Some(DeploymentStatus::DeploymentFailed),
            "Downloaded" => Some(DeploymentStatus::Downloaded),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentStatus::DeploymentSucceeded => "DeploymentSucceeded",
            DeploymentStatus::DeploymentFailed => "DeploymentFailed",
            DeploymentStatus::Downloaded => "Downloaded",
        }
    }
}

/// Write-side contract for status reports. Each call is independently
/// bounded by the caller's deadline; none of them sit on the update-check
/// path.
#[async_trait]
pub trait MetricsStore: Send + Sync {
    /// Records a client moving to a new release, decrementing the previous
    /// one's active count.
    async fn record_update(
        &self,
        deployment_key: &str,
        label: &str,
        previous_deployment_key: &str,
        previous_label_or_app_version: Option<&str>,
    ) -> Result<(), StorageError>;

    async fn increment_label_status_count(
        &self,
        deployment_key: &str,
        label: &str,
        status: DeploymentStatus,
    ) -> Result<(), StorageError>;

    /// The label the client last reported as active, if any.
    async fn get_current_active_label(
        &self,
        deployment_key: &str,
        client_unique_id: &str,
    ) -> Result<Option<String>, StorageError>;

    async fn update_active_app_for_client(
        &self,
        deployment_key: &str,
        client_unique_id: &str,
        to_label: &str,
        from_label: Option<&str>,
    ) -> Result<(), StorageError>;

    /// Best-effort cleanup of the per-client active-label marker.
    async fn remove_deployment_key_client_active_label(
        &self,
        deployment_key: &str,
        client_unique_id: &str,
    ) -> Result<(), StorageError>;

    async fn check_health(&self) -> Result<(), StorageError>;
}
