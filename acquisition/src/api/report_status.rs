//! Status-report handlers. Every metrics-store call is deadline-bounded so
//! a slow store can never stall the reporting client.

use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use semver::Version;
use shared::deadline::{DeadlineElapsed, with_deadline};
use storage::{DeploymentStatus, StorageError};

use crate::AppState;
use crate::errors::{AcquisitionError, Result};
use crate::types::{DeployReportBody, DownloadReportBody};

const SDK_VERSION_HEADER: &str = "x-codepush-sdk-version";

/// SDKs at or above this version report transitions in a single call;
/// older ones need the per-client active-label bookkeeping.
const METRICS_BREAKING_VERSION: &str = "1.5.2-beta";

const MISSING_DEPLOY_FIELDS: &str =
    "A deploy status report must contain a valid appVersion and deploymentKey.";
const MISSING_CLIENT_ID: &str =
    "A deploy status report must contain a valid appVersion, clientUniqueId and deploymentKey.";
const MISSING_STATUS: &str =
    "A deploy status report for a labelled package must contain a valid status.";
const MISSING_DOWNLOAD_FIELDS: &str =
    "A download status report must contain a valid deploymentKey and package label.";

pub async fn report_status_deploy(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<DeployReportBody>,
) -> Result<StatusCode> {
    let deployment_key = required_field(body.deployment_key.as_deref(), MISSING_DEPLOY_FIELDS)?;
    let app_version = required_field(body.app_version.as_deref(), MISSING_DEPLOY_FIELDS)?;

    let status = match (&body.label, &body.status) {
        (Some(_), None) => {
            return Err(AcquisitionError::MalformedRequest(MISSING_STATUS.into()));
        }
        (Some(_), Some(raw)) => Some(DeploymentStatus::parse(raw).ok_or_else(|| {
            AcquisitionError::MalformedRequest(format!("Invalid status: {raw}"))
        })?),
        (None, _) => None,
    };

    let previous_deployment_key = body
        .previous_deployment_key
        .clone()
        .unwrap_or_else(|| deployment_key.to_string());
    let budget = Duration::from_millis(state.config.timeouts.metrics_store_ms);

    if sdk_reports_transitions(&headers) {
        let outcome = match (&body.label, status) {
            (Some(label), Some(DeploymentStatus::DeploymentFailed)) => {
                with_deadline(
                    "metrics store",
                    budget,
                    state
                        .metrics_store
                        .increment_label_status_count(deployment_key, label, DeploymentStatus::DeploymentFailed),
                )
                .await
            }
            _ => {
                let label_or_app_version = body.label.as_deref().unwrap_or(app_version);
                with_deadline(
                    "metrics store",
                    budget,
                    state.metrics_store.record_update(
                        deployment_key,
                        label_or_app_version,
                        &previous_deployment_key,
                        body.previous_label_or_app_version.as_deref(),
                    ),
                )
                .await
            }
        };
        bounded(outcome)?;

        // Leftover per-client state from pre-transition SDK versions;
        // cleared after the response, best effort.
        if let Some(client) = body.client_unique_id.clone() {
            let metrics_store = Arc::clone(&state.metrics_store);
            tokio::spawn(async move {
                let cleanup = metrics_store
                    .remove_deployment_key_client_active_label(&previous_deployment_key, &client);
                if let Ok(Err(error)) = with_deadline("metrics store", budget, cleanup).await {
                    tracing::warn!(%error, "active-label cleanup failed");
                }
            });
        }

        return Ok(StatusCode::OK);
    }

    let client = required_field(body.client_unique_id.as_deref(), MISSING_CLIENT_ID)?;
    let current = bounded(
        with_deadline(
            "metrics store",
            budget,
            state
                .metrics_store
                .get_current_active_label(deployment_key, client),
        )
        .await,
    )?;

    match (&body.label, status) {
        (Some(label), Some(reported)) if Some(label.as_str()) != current.as_deref() => {
            bounded(
                with_deadline(
                    "metrics store",
                    budget,
                    state
                        .metrics_store
                        .increment_label_status_count(deployment_key, label, reported),
                )
                .await,
            )?;
            if reported == DeploymentStatus::DeploymentSucceeded {
                bounded(
                    with_deadline(
                        "metrics store",
                        budget,
                        state.metrics_store.update_active_app_for_client(
                            deployment_key,
                            client,
                            label,
                            current.as_deref(),
                        ),
                    )
                    .await,
                )?;
            }
        }
        (None, _) if Some(app_version) != current.as_deref() => {
            bounded(
                with_deadline(
                    "metrics store",
                    budget,
                    state.metrics_store.update_active_app_for_client(
                        deployment_key,
                        client,
                        app_version,
                        Some(app_version),
                    ),
                )
                .await,
            )?;
        }
        _ => {}
    }

    Ok(StatusCode::OK)
}

pub async fn report_status_download(
    State(state): State<AppState>,
    Json(body): Json<DownloadReportBody>,
) -> Result<StatusCode> {
    let deployment_key = required_field(body.deployment_key.as_deref(), MISSING_DOWNLOAD_FIELDS)?;
    let label = required_field(body.label.as_deref(), MISSING_DOWNLOAD_FIELDS)?;

    let budget = Duration::from_millis(state.config.timeouts.metrics_store_ms);
    bounded(
        with_deadline(
            "metrics store",
            budget,
            state.metrics_store.increment_label_status_count(
                deployment_key,
                label,
                DeploymentStatus::Downloaded,
            ),
        )
        .await,
    )?;

    Ok(StatusCode::OK)
}

fn required_field<'a>(value: Option<&'a str>, message: &str) -> Result<&'a str> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AcquisitionError::MalformedRequest(message.to_string()))
}

/// Whether the reporting SDK sends full transition reports. Proxies and
/// SDK forks decorate the version header, so everything but digits and
/// dots is stripped before parsing.
fn sdk_reports_transitions(headers: &HeaderMap) -> bool {
    let Some(raw) = headers
        .get(SDK_VERSION_HEADER)
        .and_then(|value| value.to_str().ok())
    else {
        return false;
    };
    let sanitized: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    match (
        Version::parse(&sanitized),
        Version::parse(METRICS_BREAKING_VERSION),
    ) {
        (Ok(sdk), Ok(threshold)) => sdk >= threshold,
        _ => false,
    }
}

fn bounded<T>(
    outcome: std::result::Result<std::result::Result<T, StorageError>, DeadlineElapsed>,
) -> Result<T> {
    match outcome {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(AcquisitionError::Storage(error)),
        Err(_) => Err(AcquisitionError::DependencyTimeout("metrics store")),
    }
}
