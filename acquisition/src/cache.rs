//! Cache-aside store for computed update-check responses. Keys are hashed
//! so raw deployment keys and query strings never reach the backend; a
//! slow or dead backend degrades to a miss, never to a request error.

use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use shared::counter;
use shared::deadline::with_deadline;
use std::sync::Arc;
use url::form_urlencoded;

use crate::metrics_defs::{CACHE_DEGRADED, CACHE_POPULATE_FAILED};
use crate::types::CacheableResponse;

const KEY_PREFIX: &str = "updraft";

/// Query parameters that identify the device rather than the question being
/// asked; stripped so per-device ids don't shatter the cache.
const CLIENT_ID_PARAMS: [&str; 2] = ["clientUniqueId", "client_unique_id"];

#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
}

/// Raw key/value contract against the cache backend. Values are opaque
/// serialized blobs; TTL is per entry.
#[async_trait]
pub trait UpdateCacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;
    async fn check_health(&self) -> Result<(), CacheError>;
}

/// In-process backend on moka with per-entry expiry.
pub struct MokaBackend {
    cache: moka::sync::Cache<String, (String, Duration)>,
}

struct PerEntryTtl;

impl moka::Expiry<String, (String, Duration)> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &(String, Duration),
        _created_at: std::time::Instant,
    ) -> Option<Duration> {
        Some(value.1)
    }
}

impl MokaBackend {
    pub fn new(max_capacity: u64) -> Self {
        let cache = moka::sync::Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryTtl)
            .build();
        MokaBackend { cache }
    }
}

#[async_trait]
impl UpdateCacheBackend for MokaBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.cache.get(key).map(|(value, _)| value))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        self.cache.insert(key.to_string(), (value, ttl));
        Ok(())
    }

    async fn check_health(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

/// Normalized, order-independent representation of the request URL used as
/// half of the cache key. Stable under query-parameter reordering and under
/// presence/absence of the device id parameter.
pub fn url_fingerprint(path: &str, query: Option<&str>) -> String {
    let mut pairs: Vec<(String, String)> = match query {
        Some(q) => form_urlencoded::parse(q.as_bytes())
            .filter(|(key, _)| !CLIENT_ID_PARAMS.contains(&key.as_ref()))
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect(),
        None => Vec::new(),
    };
    pairs.sort();

    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in &pairs {
        serializer.append_pair(key, value);
    }
    format!("{path}?{}", serializer.finish())
}

fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut hex = String::with_capacity(16);
    for byte in &digest[..8] {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

/// Cache-aside wrapper the pipeline talks to. Absence of a backend is a
/// valid mode: every get is a miss, every set a no-op.
pub struct ResponseCache {
    backend: Option<Arc<dyn UpdateCacheBackend>>,
    get_budget: Duration,
}

impl ResponseCache {
    pub fn new(backend: Option<Arc<dyn UpdateCacheBackend>>, get_budget: Duration) -> Self {
        ResponseCache {
            backend,
            get_budget,
        }
    }

    pub fn disabled() -> Self {
        ResponseCache {
            backend: None,
            get_budget: Duration::from_millis(0),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.backend.is_some()
    }

    fn cache_key(deployment_key: &str, fingerprint: &str) -> String {
        format!(
            "{KEY_PREFIX}:cache:{}:{}",
            short_hash(deployment_key),
            short_hash(fingerprint)
        )
    }

    /// Bounded-latency lookup. Timeouts and backend errors are logged and
    /// reported as misses; the caller falls back to the primary store.
    pub async fn get(&self, deployment_key: &str, fingerprint: &str) -> Option<CacheableResponse> {
        let backend = self.backend.as_ref()?;
        let key = Self::cache_key(deployment_key, fingerprint);

        let raw = match with_deadline("update cache", self.get_budget, backend.get(&key)).await {
            Ok(Ok(found)) => found?,
            Ok(Err(error)) => {
                counter!(CACHE_DEGRADED).increment(1);
                tracing::error!(%error, "cache read failed, treating as miss");
                return None;
            }
            Err(elapsed) => {
                counter!(CACHE_DEGRADED).increment(1);
                tracing::error!(%elapsed, "cache read timed out, treating as miss");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(response) => Some(response),
            Err(error) => {
                tracing::error!(%error, "corrupt cached response, treating as miss");
                None
            }
        }
    }

    /// Best-effort write. Never fails the caller; failures are logged and
    /// counted only.
    pub async fn set(
        &self,
        deployment_key: &str,
        fingerprint: &str,
        response: &CacheableResponse,
        ttl: Duration,
    ) {
        let Some(backend) = self.backend.as_ref() else {
            return;
        };
        let key = Self::cache_key(deployment_key, fingerprint);

        let raw = match serde_json::to_string(response) {
            Ok(raw) => raw,
            Err(error) => {
                tracing::error!(%error, "could not serialize response for caching");
                return;
            }
        };

        if let Err(error) = backend.set(&key, raw, ttl).await {
            counter!(CACHE_POPULATE_FAILED).increment(1);
            tracing::error!(%error, "failed to populate response cache");
        }
    }

    /// Health of the backend, vacuously healthy when none is configured.
    pub async fn check_health(&self) -> Result<(), CacheError> {
        match self.backend.as_ref() {
            Some(backend) => backend.check_health().await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{UpdateCheckCacheResponse, UpdateInfo};

    fn sample_response() -> CacheableResponse {
        CacheableResponse {
            status_code: 200,
            body: UpdateCheckCacheResponse {
                original_package: UpdateInfo {
                    label: "v3".into(),
                    package_hash: "h3".into(),
                    is_available: true,
                    ..UpdateInfo::default()
                },
                rollout: Some(25),
                rollout_package: None,
            },
        }
    }

    fn moka_cache() -> ResponseCache {
        ResponseCache::new(
            Some(Arc::new(MokaBackend::new(100))),
            Duration::from_millis(100),
        )
    }

    #[test]
    fn fingerprint_is_order_independent() {
        let a = url_fingerprint(
            "/updateCheck",
            Some("deploymentKey=dk&appVersion=1.0.0&packageHash=h1"),
        );
        let b = url_fingerprint(
            "/updateCheck",
            Some("packageHash=h1&deploymentKey=dk&appVersion=1.0.0"),
        );
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_strips_device_id_in_both_spellings() {
        let bare = url_fingerprint("/updateCheck", Some("appVersion=1.0.0&deploymentKey=dk"));
        let camel = url_fingerprint(
            "/updateCheck",
            Some("appVersion=1.0.0&clientUniqueId=abc&deploymentKey=dk"),
        );
        let snake = url_fingerprint(
            "/updateCheck",
            Some("client_unique_id=other&appVersion=1.0.0&deploymentKey=dk"),
        );
        assert_eq!(bare, camel);
        assert_eq!(bare, snake);
    }

    #[test]
    fn fingerprint_distinguishes_different_queries() {
        let a = url_fingerprint("/updateCheck", Some("appVersion=1.0.0&deploymentKey=dk"));
        let b = url_fingerprint("/updateCheck", Some("appVersion=2.0.0&deploymentKey=dk"));
        assert_ne!(a, b);
    }

    #[test]
    fn composite_key_hides_raw_inputs_and_bounds_length() {
        let key = ResponseCache::cache_key("secret-deployment-key", "/updateCheck?appVersion=1");
        assert!(!key.contains("secret-deployment-key"));
        assert!(!key.contains("appVersion"));
        assert!(key.len() <= 64);
        assert!(key.starts_with("updraft:cache:"));
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let cache = moka_cache();
        let response = sample_response();

        assert!(cache.get("dk", "/u?a=1").await.is_none());
        cache.set("dk", "/u?a=1", &response, Duration::from_secs(60)).await;
        assert_eq!(cache.get("dk", "/u?a=1").await, Some(response));

        // A different fingerprint misses.
        assert!(cache.get("dk", "/u?a=2").await.is_none());
    }

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let cache = moka_cache();
        cache
            .set("dk", "/u?a=1", &sample_response(), Duration::from_millis(20))
            .await;
        assert!(cache.get("dk", "/u?a=1").await.is_some());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(cache.get("dk", "/u?a=1").await.is_none());
    }

    #[tokio::test]
    async fn unconfigured_cache_misses_and_noops() {
        let cache = ResponseCache::disabled();
        assert!(!cache.is_configured());
        cache
            .set("dk", "/u?a=1", &sample_response(), Duration::from_secs(60))
            .await;
        assert!(cache.get("dk", "/u?a=1").await.is_none());
        assert!(cache.check_health().await.is_ok());
    }

    struct SlowBackend;

    #[async_trait]
    impl UpdateCacheBackend for SlowBackend {
        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Some("never".into()))
        }

        async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), CacheError> {
            Ok(())
        }

        async fn check_health(&self) -> Result<(), CacheError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn slow_backend_degrades_to_miss() {
        let cache = ResponseCache::new(Some(Arc::new(SlowBackend)), Duration::from_millis(10));
        assert!(cache.get("dk", "/u?a=1").await.is_none());
    }

    struct BrokenBackend;

    #[async_trait]
    impl UpdateCacheBackend for BrokenBackend {
        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Backend("connection refused".into()))
        }

        async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::Backend("connection refused".into()))
        }

        async fn check_health(&self) -> Result<(), CacheError> {
            Err(CacheError::Backend("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn broken_backend_degrades_to_miss_and_swallows_set_failures() {
        let cache = ResponseCache::new(Some(Arc::new(BrokenBackend)), Duration::from_millis(50));
        assert!(cache.get("dk", "/u?a=1").await.is_none());
        // Must not panic or error.
        cache
            .set("dk", "/u?a=1", &sample_response(), Duration::from_secs(60))
            .await;
        assert!(cache.check_health().await.is_err());
    }
}
