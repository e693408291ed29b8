//! The update-check pipeline: validate, consult the response cache, fall
//! back to package history plus resolution, then apply cohort selection
//! per device. Cache population happens after the response is sent.

use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use shared::counter;

use crate::AppState;
use crate::cache::url_fingerprint;
use crate::errors::{AcquisitionError, Result};
use crate::metrics_defs::{UPDATE_CHECK_CACHE_HIT, UPDATE_CHECK_CACHE_MISS};
use crate::resolver;
use crate::rollout::is_selected_for_rollout;
use crate::types::{
    CacheableResponse, UpdateCheckCacheResponse, UpdateCheckParams, UpdateCheckRequest, UpdateInfo,
    UpdateInfoSnake,
};

const MISSING_DEPLOYMENT_KEY: &str =
    "An update check must include a valid deployment key - please check that your app has been \
     configured correctly.";

pub async fn update_check_legacy(
    State(state): State<AppState>,
    uri: Uri,
    Query(params): Query<UpdateCheckParams>,
) -> Result<Response> {
    update_check(state, uri, params, false).await
}

pub async fn update_check_versioned(
    State(state): State<AppState>,
    uri: Uri,
    Query(params): Query<UpdateCheckParams>,
) -> Result<Response> {
    update_check(state, uri, params, true).await
}

async fn update_check(
    state: AppState,
    uri: Uri,
    params: UpdateCheckParams,
    snake: bool,
) -> Result<Response> {
    let deployment_key = params
        .deployment_key
        .as_deref()
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .ok_or_else(|| AcquisitionError::MalformedRequest(MISSING_DEPLOYMENT_KEY.into()))?
        .to_string();

    let request = UpdateCheckRequest {
        deployment_key: deployment_key.clone(),
        // Resolution reports a descriptive 400 for anything unparseable,
        // including an absent version.
        app_version: params.app_version.clone().unwrap_or_default(),
        package_hash: params.package_hash.clone().filter(|hash| !hash.is_empty()),
        is_companion: params
            .is_companion
            .as_deref()
            .is_some_and(|value| value.eq_ignore_ascii_case("true")),
        label: params.label.clone().filter(|label| !label.is_empty()),
    };

    let fingerprint = url_fingerprint(uri.path(), uri.query());
    let cached = state.cache.get(&deployment_key, &fingerprint).await;
    let from_cache = cached.is_some();

    let response = match cached {
        Some(found) => {
            counter!(UPDATE_CHECK_CACHE_HIT).increment(1);
            found
        }
        None => {
            counter!(UPDATE_CHECK_CACHE_MISS).increment(1);
            let history = state
                .storage
                .get_package_history_from_deployment_key(&deployment_key)
                .await?;
            let decision = resolver::resolve(&history, &request)?;
            CacheableResponse {
                status_code: 200,
                body: decision,
            }
        }
    };

    // Cohort selection is per device and happens on every request, cached
    // or not; the cached decision carries both branches.
    let mut update_info =
        select_cohort_branch(&response.body, params.client_unique_id.as_deref());
    update_info.target_binary_range = Some(update_info.app_version.clone());

    let status = StatusCode::from_u16(response.status_code).unwrap_or(StatusCode::OK);
    let body = if snake {
        json!({ "update_info": UpdateInfoSnake::from(update_info) })
    } else {
        json!({ "updateInfo": update_info })
    };

    // Population runs detached and must never delay the response; it may
    // land before or after emission, and races are last-write-wins over
    // the same decision.
    if !from_cache && state.cache.is_configured() && status == StatusCode::OK {
        let cache = Arc::clone(&state.cache);
        let ttl = Duration::from_secs(state.config.cache.ttl_seconds);
        tokio::spawn(async move {
            cache.set(&deployment_key, &fingerprint, &response, ttl).await;
        });
    }

    Ok((status, Json(body)).into_response())
}

/// Picks between the two cached branches. Devices inside the rollout cohort
/// get the mid-rollout package; everyone else, including devices that sent
/// no id, keeps the fully rolled out decision.
fn select_cohort_branch(
    decision: &UpdateCheckCacheResponse,
    client_unique_id: Option<&str>,
) -> UpdateInfo {
    if let (Some(rollout_package), Some(client)) =
        (decision.rollout_package.as_ref(), client_unique_id)
    {
        let identifier = if rollout_package.label.is_empty() {
            &rollout_package.package_hash
        } else {
            &rollout_package.label
        };
        if is_selected_for_rollout(client, decision.rollout, identifier) {
            return rollout_package.clone();
        }
    }
    decision.original_package.clone()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use storage::memory::{InMemoryMetricsStore, InMemoryStorage};
    use tower::ServiceExt;

    use crate::api::router;
    use crate::cache::{MokaBackend, ResponseCache};
    use crate::config::Config;
    use crate::rollout::is_selected_for_rollout;
    use crate::testutils::PackageBuilder;
    use crate::AppState;

    fn state_with(storage: Arc<InMemoryStorage>) -> AppState {
        AppState {
            storage,
            metrics_store: Arc::new(InMemoryMetricsStore::new()),
            cache: Arc::new(ResponseCache::new(
                Some(Arc::new(MokaBackend::new(100))),
                Duration::from_millis(100),
            )),
            config: Arc::new(Config::default()),
        }
    }

    async fn get_json(state: AppState, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn missing_deployment_key_is_a_descriptive_400() {
        let state = state_with(Arc::new(InMemoryStorage::new()));
        let response = router(state)
            .oneshot(
                Request::builder()
                    .uri("/updateCheck?appVersion=1.0.0")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("deployment key"));
    }

    #[tokio::test]
    async fn unparseable_app_version_is_a_400() {
        let state = state_with(Arc::new(
            InMemoryStorage::new().with_history("dk-test", vec![]),
        ));
        let (status, _) = get_json(
            state,
            "/updateCheck?deploymentKey=dk-test&appVersion=garbage",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_deployment_key_is_a_404() {
        let state = state_with(Arc::new(InMemoryStorage::new()));
        let (status, _) =
            get_json(state, "/updateCheck?deploymentKey=nope&appVersion=1.0.0").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn offers_update_and_mirrors_target_binary_range() {
        let history = vec![PackageBuilder::new("v1", "h1").build()];
        let state = state_with(Arc::new(
            InMemoryStorage::new().with_history("dk-test", history),
        ));
        let (status, body) = get_json(
            state,
            "/updateCheck?deploymentKey=dk-test&appVersion=1.0.0&clientUniqueId=c1",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let info = &body["updateInfo"];
        assert_eq!(info["isAvailable"], true);
        assert_eq!(info["packageHash"], "h1");
        assert_eq!(info["label"], "v1");
        assert_eq!(info["target_binary_range"], "1.0.0");
    }

    #[tokio::test]
    async fn versioned_route_serves_snake_case() {
        let history = vec![PackageBuilder::new("v1", "h1").build()];
        let state = state_with(Arc::new(
            InMemoryStorage::new().with_history("dk-test", history),
        ));
        let (status, body) = get_json(
            state,
            "/v0.1/public/codepush/update_check?deployment_key=dk-test&app_version=1.0.0",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let info = &body["update_info"];
        assert_eq!(info["is_available"], true);
        assert_eq!(info["download_url"], "https://blobs.example/h1");
        assert!(info.get("downloadURL").is_none());
    }

    #[tokio::test]
    async fn rollout_splits_clients_into_cohorts() {
        let history = vec![
            PackageBuilder::new("v1", "h1").build(),
            PackageBuilder::new("v2", "h2").rollout(50).build(),
        ];
        let storage = Arc::new(InMemoryStorage::new().with_history("dk-test", history));

        let selected = (0..)
            .map(|i| format!("client-{i}"))
            .find(|id| is_selected_for_rollout(id, Some(50), "v2"))
            .unwrap();
        let excluded = (0..)
            .map(|i| format!("client-{i}"))
            .find(|id| !is_selected_for_rollout(id, Some(50), "v2"))
            .unwrap();

        let (_, in_cohort) = get_json(
            state_with(Arc::clone(&storage)),
            &format!(
                "/updateCheck?deploymentKey=dk-test&appVersion=1.0.0&packageHash=h1&clientUniqueId={selected}"
            ),
        )
        .await;
        assert_eq!(in_cohort["updateInfo"]["isAvailable"], true);
        assert_eq!(in_cohort["updateInfo"]["packageHash"], "h2");

        let (_, outside) = get_json(
            state_with(storage),
            &format!(
                "/updateCheck?deploymentKey=dk-test&appVersion=1.0.0&packageHash=h1&clientUniqueId={excluded}"
            ),
        )
        .await;
        assert_eq!(outside["updateInfo"]["isAvailable"], false);
    }

    #[tokio::test]
    async fn second_identical_request_is_served_from_cache() {
        let storage = Arc::new(InMemoryStorage::new().with_history(
            "dk-test",
            vec![PackageBuilder::new("v1", "h1").build()],
        ));
        let state = state_with(Arc::clone(&storage));

        let uri = "/updateCheck?deploymentKey=dk-test&appVersion=1.0.0";
        let (_, first) = get_json(state.clone(), uri).await;
        assert_eq!(first["updateInfo"]["label"], "v1");

        // Population is detached; give it a beat, then change the history
        // underneath. A cached decision must not see the new release.
        tokio::time::sleep(Duration::from_millis(50)).await;
        storage
            .commit_package("dk-test", PackageBuilder::new("", "h2").build())
            .unwrap();

        let (_, second) = get_json(state, uri).await;
        assert_eq!(second["updateInfo"]["label"], "v1");
    }

    #[tokio::test]
    async fn device_id_does_not_shatter_the_cache() {
        let storage = Arc::new(InMemoryStorage::new().with_history(
            "dk-test",
            vec![PackageBuilder::new("v1", "h1").build()],
        ));
        let state = state_with(Arc::clone(&storage));

        let (_, first) = get_json(
            state.clone(),
            "/updateCheck?deploymentKey=dk-test&appVersion=1.0.0&clientUniqueId=aaa",
        )
        .await;
        assert_eq!(first["updateInfo"]["label"], "v1");

        tokio::time::sleep(Duration::from_millis(50)).await;
        storage
            .commit_package("dk-test", PackageBuilder::new("", "h2").build())
            .unwrap();

        // Different device, same question: still a hit.
        let (_, second) = get_json(
            state,
            "/updateCheck?deploymentKey=dk-test&appVersion=1.0.0&clientUniqueId=bbb",
        )
        .await;
        assert_eq!(second["updateInfo"]["label"], "v1");
    }
}
