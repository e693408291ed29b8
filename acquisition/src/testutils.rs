use storage::{Package, ReleaseMethod};

use crate::types::UpdateCheckRequest;

/// Fluent fixture for package-history entries.
pub(crate) struct PackageBuilder(Package);

impl PackageBuilder {
    pub fn new(label: &str, hash: &str) -> Self {
        PackageBuilder(Package {
            app_version: "1.0.0".into(),
            blob_url: format!("https://blobs.example/{hash}"),
            description: format!("release {label}"),
            is_disabled: false,
            is_mandatory: false,
            label: Some(label.into()),
            manifest_blob_url: None,
            original_deployment: None,
            original_label: None,
            package_hash: hash.into(),
            released_by: None,
            release_method: Some(ReleaseMethod::Upload),
            rollout: None,
            size: 1024,
            upload_time: 1_700_000_000_000,
        })
    }

    pub fn app_version(mut self, range: &str) -> Self {
        self.0.app_version = range.into();
        self
    }

    pub fn rollout(mut self, percentage: u32) -> Self {
        self.0.rollout = Some(percentage);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.0.is_disabled = true;
        self
    }

    pub fn mandatory(mut self) -> Self {
        self.0.is_mandatory = true;
        self
    }

    pub fn build(self) -> Package {
        self.0
    }
}

pub(crate) fn request(app_version: &str) -> UpdateCheckRequest {
    UpdateCheckRequest {
        deployment_key: "dk-test".into(),
        app_version: app_version.into(),
        package_hash: None,
        is_companion: false,
        label: None,
    }
}

pub(crate) fn request_with_hash(app_version: &str, hash: &str) -> UpdateCheckRequest {
    UpdateCheckRequest {
        package_hash: Some(hash.into()),
        ..request(app_version)
    }
}
