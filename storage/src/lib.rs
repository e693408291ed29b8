//! Narrow collaborator contracts: the acquisition pipeline only reads
//! package history by deployment key and forwards status reports to a
//! metrics store. Everything behind those two traits is supplied by the
//! embedding process.

pub mod error;
pub mod json_file;
pub mod memory;
pub mod metrics_store;
pub mod package;

pub use error::StorageError;
pub use metrics_store::{DeploymentStatus, MetricsStore};
pub use package::{MAX_PACKAGE_HISTORY_LENGTH, Package, ReleaseMethod, next_label};

use async_trait::async_trait;

/// Read-side contract against the primary store.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Returns the full package history for a deployment, oldest first.
    ///
    /// Fails with [`StorageError::NotFound`] when the key is unknown; a
    /// deployment with no releases yet returns an empty sequence.
    async fn get_package_history_from_deployment_key(
        &self,
        deployment_key: &str,
    ) -> Result<Vec<Package>, StorageError>;

    async fn check_health(&self) -> Result<(), StorageError>;
}
