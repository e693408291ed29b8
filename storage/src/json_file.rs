/// File-backed store for local single-node deployments: one JSON document
/// mapping deployment keys to package histories. The file is read once at
/// startup; the acquisition path is read-only against it.
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::StorageError;
use crate::package::Package;
use crate::Storage;

#[derive(Debug)]
pub struct JsonFileStorage {
    path: PathBuf,
    deployments: HashMap<String, Vec<Package>>,
}

impl JsonFileStorage {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let deployments: HashMap<String, Vec<Package>> = serde_json::from_reader(reader)?;

        tracing::info!(
            path = %path.display(),
            deployments = deployments.len(),
            "loaded package histories from file"
        );

        Ok(JsonFileStorage {
            path: path.to_path_buf(),
            deployments,
        })
    }
}

#[async_trait]
impl Storage for JsonFileStorage {
    async fn get_package_history_from_deployment_key(
        &self,
        deployment_key: &str,
    ) -> Result<Vec<Package>, StorageError> {
        self.deployments
            .get(deployment_key)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn check_health(&self) -> Result<(), StorageError> {
        // The backing file must still be readable; the loaded snapshot
        // itself cannot go bad.
        std::fs::metadata(&self.path)?;
        Ok(())
    }
}
