use serde::{Deserialize, Serialize};

/// A deployment's history is append-only and capped; committing past the
/// cap evicts the oldest entry.
pub const MAX_PACKAGE_HISTORY_LENGTH: usize = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReleaseMethod {
    Upload,
    Promote,
    Rollback,
}

/// A committed release artifact. Immutable once it enters a deployment's
/// history; the label is assigned at commit time and strictly increases
/// with upload order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    /// Binary version (or semver range) this release targets.
    pub app_version: String,
    pub blob_url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_disabled: bool,
    #[serde(default)]
    pub is_mandatory: bool,
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_blob_url: Option<String>,
    /// Set on promote/rollback for audit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_deployment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_label: Option<String>,
    pub package_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub released_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_method: Option<ReleaseMethod>,
    /// Percentage of clients eligible for this release. Absent means 100.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollout: Option<u32>,
    pub size: u64,
    /// Milliseconds since the Unix epoch.
    pub upload_time: u64,
}

impl Package {
    /// The identifier rollout cohorts are anchored to: the label when the
    /// release has one, otherwise its content hash.
    pub fn release_identifier(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.package_hash)
    }

    /// A rollout that has started but not yet reached every client. Zero
    /// is treated like absent: the release is not cohort-gated.
    pub fn is_unfinished_rollout(&self) -> bool {
        matches!(self.rollout, Some(percentage) if percentage > 0 && percentage < 100)
    }
}

/// Computes the label for the next commit: the last entry's numeric suffix
/// plus one, or `v1` for an empty history.
pub fn next_label(history: &[Package]) -> String {
    let last = history.iter().rev().find_map(|entry| entry.label.as_deref());
    match last.and_then(|label| label.strip_prefix('v')) {
        Some(suffix) => match suffix.parse::<u64>() {
            Ok(n) => format!("v{}", n + 1),
            Err(_) => "v1".to_string(),
        },
        None => "v1".to_string(),
    }
}
