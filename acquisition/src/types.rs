//! Wire-facing request and response shapes. Query and body fields accept
//! both route families' spellings; responses are serialized per family.

use serde::{Deserialize, Serialize};

/// A parsed, validated update-check query. Immutable once built.
#[derive(Clone, Debug, PartialEq)]
pub struct UpdateCheckRequest {
    pub deployment_key: String,
    pub app_version: String,
    pub package_hash: Option<String>,
    pub is_companion: bool,
    pub label: Option<String>,
}

/// Raw update-check query parameters, accepting both route families'
/// spellings. Validation happens after extraction so that missing fields
/// produce the descriptive 400s clients rely on.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateCheckParams {
    #[serde(alias = "deploymentKey")]
    pub deployment_key: Option<String>,
    #[serde(alias = "appVersion")]
    pub app_version: Option<String>,
    #[serde(alias = "packageHash")]
    pub package_hash: Option<String>,
    #[serde(alias = "isCompanion")]
    pub is_companion: Option<String>,
    #[serde(alias = "clientUniqueId")]
    pub client_unique_id: Option<String>,
    pub label: Option<String>,
}

/// Body of a deploy status report, accepting both spellings.
#[derive(Debug, Default, Deserialize)]
pub struct DeployReportBody {
    #[serde(alias = "deploymentKey")]
    pub deployment_key: Option<String>,
    #[serde(alias = "appVersion")]
    pub app_version: Option<String>,
    #[serde(alias = "previousDeploymentKey")]
    pub previous_deployment_key: Option<String>,
    #[serde(alias = "previousLabelOrAppVersion")]
    pub previous_label_or_app_version: Option<String>,
    #[serde(alias = "clientUniqueId")]
    pub client_unique_id: Option<String>,
    pub label: Option<String>,
    pub status: Option<String>,
}

/// Body of a download status report.
#[derive(Debug, Default, Deserialize)]
pub struct DownloadReportBody {
    #[serde(alias = "deploymentKey")]
    pub deployment_key: Option<String>,
    pub label: Option<String>,
    #[serde(alias = "clientUniqueId")]
    pub client_unique_id: Option<String>,
}

/// The `updateInfo` object served to clients, in its legacy spelling.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateInfo {
    #[serde(rename = "downloadURL")]
    pub download_url: String,
    pub description: String,
    #[serde(rename = "isAvailable")]
    pub is_available: bool,
    #[serde(rename = "isMandatory")]
    pub is_mandatory: bool,
    #[serde(rename = "appVersion")]
    pub app_version: String,
    #[serde(rename = "packageHash")]
    pub package_hash: String,
    pub label: String,
    #[serde(rename = "packageSize")]
    pub package_size: u64,
    #[serde(rename = "updateAppVersion")]
    pub update_app_version: bool,
    #[serde(rename = "shouldRunBinaryVersion")]
    pub should_run_binary_version: bool,
    /// Mirrors `app_version`; set by the route handler on both families.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_binary_range: Option<String>,
}

/// Snake-cased rendering of [`UpdateInfo`] for the versioned routes.
#[derive(Debug, Serialize)]
pub struct UpdateInfoSnake {
    pub download_url: String,
    pub description: String,
    pub is_available: bool,
    pub is_mandatory: bool,
    pub app_version: String,
    pub package_hash: String,
    pub label: String,
    pub package_size: u64,
    pub update_app_version: bool,
    pub should_run_binary_version: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_binary_range: Option<String>,
}

impl From<UpdateInfo> for UpdateInfoSnake {
    fn from(info: UpdateInfo) -> Self {
        UpdateInfoSnake {
            download_url: info.download_url,
            description: info.description,
            is_available: info.is_available,
            is_mandatory: info.is_mandatory,
            app_version: info.app_version,
            package_hash: info.package_hash,
            label: info.label,
            package_size: info.package_size,
            update_app_version: info.update_app_version,
            should_run_binary_version: info.should_run_binary_version,
            target_binary_range: info.target_binary_range,
        }
    }
}

/// The full resolved decision, cached so that cohort re-evaluation on a
/// cache hit still has both branches available.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCheckCacheResponse {
    /// What a client outside any rollout cohort receives.
    pub original_package: UpdateInfo,
    /// Percentage in force when the decision was computed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollout: Option<u32>,
    /// Served instead of `original_package` to clients inside the cohort.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollout_package: Option<UpdateInfo>,
}

/// Wire-ready envelope stored in the response cache. Opaque to the cache
/// layer itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheableResponse {
    pub status_code: u16,
    pub body: UpdateCheckCacheResponse,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_info_uses_legacy_key_spellings() {
        let info = UpdateInfo {
            download_url: "https://blobs.example/h2".into(),
            is_available: true,
            app_version: "1.2.3".into(),
            package_hash: "h2".into(),
            label: "v2".into(),
            package_size: 42,
            target_binary_range: Some("1.2.3".into()),
            ..UpdateInfo::default()
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["downloadURL"], "https://blobs.example/h2");
        assert_eq!(json["isAvailable"], true);
        assert_eq!(json["packageHash"], "h2");
        assert_eq!(json["target_binary_range"], "1.2.3");
    }

    #[test]
    fn snake_rendering_matches_versioned_api() {
        let info = UpdateInfo {
            download_url: "u".into(),
            is_mandatory: true,
            package_size: 7,
            ..UpdateInfo::default()
        };
        let json = serde_json::to_value(UpdateInfoSnake::from(info)).unwrap();
        assert_eq!(json["download_url"], "u");
        assert_eq!(json["is_mandatory"], true);
        assert_eq!(json["package_size"], 7);
        assert!(json.get("downloadURL").is_none());
    }

    #[test]
    fn cacheable_response_round_trips_through_json() {
        let response = CacheableResponse {
            status_code: 200,
            body: UpdateCheckCacheResponse {
                original_package: UpdateInfo::default(),
                rollout: Some(50),
                rollout_package: Some(UpdateInfo {
                    label: "v2".into(),
                    ..UpdateInfo::default()
                }),
            },
        };
        let raw = serde_json::to_string(&response).unwrap();
        let parsed: CacheableResponse = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, response);
    }

    #[test]
    fn params_accept_both_spellings() {
        let camel: UpdateCheckParams =
            serde_json::from_str(r#"{"deploymentKey":"dk","appVersion":"1.0.0"}"#).unwrap();
        assert_eq!(camel.deployment_key.as_deref(), Some("dk"));
        assert_eq!(camel.app_version.as_deref(), Some("1.0.0"));

        let snake: UpdateCheckParams =
            serde_json::from_str(r#"{"deployment_key":"dk","app_version":"1.0.0"}"#).unwrap();
        assert_eq!(snake.deployment_key.as_deref(), Some("dk"));
    }
}
