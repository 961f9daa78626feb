//! API facade.
//!
//! [`ApiClient`] owns every piece of client state (token store, cache,
//! rate limiter, in-flight map, throttle) and exposes the two primitives the
//! domain methods are built on: [`ApiClient::request`] and
//! [`ApiClient::cached_request`]. Domain methods live in the sibling modules
//! as further `impl ApiClient` blocks; they pick an endpoint and verb, and
//! reshape `{ data: ... }` envelopes into typed payloads.

pub mod auth;
pub mod discounts;
pub mod meal_plans;
pub mod models;
pub mod notifications;
pub mod orders;
pub mod subscriptions;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::auth::{user_id_for, FileTokenStorage, MemoryTokenStorage, TokenStorage, TokenStore};
use crate::cache::{CachePolicies, CacheStats, CacheStore, CacheType, MemoryCacheStore};
use crate::config::ClientConfig;
use crate::error::ClientResult;
use crate::http::{
    ApiResponse, CacheOptions, CachedRequester, Deduplicator, RequestExecutor, RequestSpec,
};
use crate::rate_limit::{RateLimiter, SlidingWindowLimiter};

/// Client for the food-subscription backend.
#[derive(Clone)]
pub struct ApiClient {
    config: Arc<ClientConfig>,
    tokens: Arc<TokenStore>,
    cache: Arc<dyn CacheStore>,
    persistent_cache: Option<MemoryCacheStore>,
    dedup: Arc<Deduplicator>,
    cached: CachedRequester,
}

impl ApiClient {
    /// Build a client with the collaborators implied by `config`.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        ApiClientBuilder::new(config).build()
    }

    pub fn builder(config: ClientConfig) -> ApiClientBuilder {
        ApiClientBuilder::new(config)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn token_store(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn cache(&self) -> &Arc<dyn CacheStore> {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Distinct requests currently on the wire.
    pub fn in_flight_requests(&self) -> usize {
        self.dedup.in_flight()
    }

    /// User the stored token belongs to, "anonymous" without one.
    pub async fn current_user_id(&self) -> String {
        user_id_for(self.tokens.get_stored_token().await.as_deref())
    }

    /// Uncached request with the current token.
    pub async fn request(&self, method: Method, endpoint: &str, body: Option<Value>) -> ApiResponse {
        let mut spec = RequestSpec::new(method, endpoint)
            .with_token(self.tokens.get_stored_token().await);
        spec.body = body;
        self.dedup.deduplicate(spec).await
    }

    /// Cached GET with the current token.
    pub async fn cached_request(
        &self,
        endpoint: &str,
        cache_type: CacheType,
        options: CacheOptions,
    ) -> ApiResponse {
        let spec = RequestSpec::get(endpoint).with_token(self.tokens.get_stored_token().await);
        self.cached.cached_request(spec, cache_type, options).await
    }

    /// Drop the current user's cached entries of the given types.
    pub async fn invalidate(&self, cache_types: &[CacheType]) {
        let user_id = self.current_user_id().await;
        for cache_type in cache_types {
            self.cache.clear(*cache_type, &user_id).await;
        }
    }

    /// Wait for background cache refreshes started by stale hits.
    ///
    /// Long-lived clients never need this; a process about to exit calls it
    /// so revalidated data reaches the cache before [`persist_cache`](Self::persist_cache).
    pub async fn wait_for_refreshes(&self) {
        self.cached.wait_for_refreshes().await;
    }

    /// Write the cache to its persistence file, if one is configured.
    pub fn persist_cache(&self) -> ClientResult<()> {
        if let Some(store) = &self.persistent_cache {
            store.save_to_file()?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.config.api.base_url)
            .field("environment", &self.config.api.environment)
            .field("dedup", &self.dedup)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ApiClient`]. Collaborators default from the configuration.
pub struct ApiClientBuilder {
    config: ClientConfig,
    token_storage: Option<Arc<dyn TokenStorage>>,
    cache: Option<Arc<dyn CacheStore>>,
    limiter: Option<Arc<dyn RateLimiter>>,
}

impl ApiClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            token_storage: None,
            cache: None,
            limiter: None,
        }
    }

    pub fn token_storage(mut self, storage: Arc<dyn TokenStorage>) -> Self {
        self.token_storage = Some(storage);
        self
    }

    pub fn cache_store(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn rate_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn build(self) -> ClientResult<ApiClient> {
        let config = self.config;

        let storage = self.token_storage.unwrap_or_else(|| match &config.token.storage_path {
            Some(path) => Arc::new(FileTokenStorage::new(path)) as Arc<dyn TokenStorage>,
            None => Arc::new(MemoryTokenStorage::new()),
        });
        let tokens = Arc::new(TokenStore::new(
            storage,
            Duration::from_secs(config.token.cache_ttl_secs),
        ));

        let (cache, persistent_cache) = match self.cache {
            Some(cache) => (cache, None),
            None => {
                let policies = CachePolicies::from_config(&config.cache);
                let store = match &config.cache.persistence_path {
                    Some(path) => load_cache_or_empty(policies, PathBuf::from(path)),
                    None => MemoryCacheStore::new(policies, None),
                };
                let persistent = config.cache.persistence_path.as_ref().map(|_| store.clone());
                (Arc::new(store) as Arc<dyn CacheStore>, persistent)
            }
        };

        let limiter = self.limiter.unwrap_or_else(|| {
            Arc::new(SlidingWindowLimiter::new(config.rate_limit.clone())) as Arc<dyn RateLimiter>
        });

        let executor = Arc::new(RequestExecutor::new(&config, limiter)?);
        let dedup = Arc::new(Deduplicator::new(executor));
        let cached = CachedRequester::new(dedup.clone(), cache.clone());

        tracing::debug!(
            base_url = %config.api.base_url,
            environment = ?config.api.environment,
            "API client initialized"
        );

        Ok(ApiClient {
            config: Arc::new(config),
            tokens,
            cache,
            persistent_cache,
            dedup,
            cached,
        })
    }
}

/// Load the persisted cache. An unreadable file is logged and replaced on the next save.
fn load_cache_or_empty(policies: CachePolicies, path: PathBuf) -> MemoryCacheStore {
    match MemoryCacheStore::load_from_file(policies.clone(), &path) {
        Ok(store) => store,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Ignoring unreadable cache file, starting empty"
            );
            MemoryCacheStore::new(policies, Some(path))
        }
    }
}

/// Strip `{ data: ... }` wrappers, at most two levels deep.
///
/// Objects that look like resources (carry `_id` or `id`) are not unwrapped
/// further, so a resource with its own `data` field survives.
pub(crate) fn payload(value: Value) -> Value {
    let mut current = value;
    for _ in 0..2 {
        match current {
            Value::Object(mut map)
                if map.contains_key("data")
                    && !map.contains_key("_id")
                    && !map.contains_key("id") =>
            {
                current = map.remove("data").unwrap_or(Value::Null);
            }
            other => return other,
        }
    }
    current
}

/// Typed list from an envelope. Failures and unexpected shapes yield an empty list.
pub(crate) fn into_list<T: DeserializeOwned>(response: ApiResponse) -> ApiResponse<Vec<T>> {
    let items = response
        .data
        .clone()
        .map(payload)
        .and_then(|value| decode::<Vec<T>>(value, "list"))
        .unwrap_or_default();
    response.with_data(Some(items))
}

/// Typed item from an envelope. Failures and unexpected shapes yield `None`.
pub(crate) fn into_item<T: DeserializeOwned>(response: ApiResponse) -> ApiResponse<T> {
    let item = if response.success {
        response
            .data
            .clone()
            .map(payload)
            .and_then(|value| decode::<T>(value, "item"))
    } else {
        None
    };
    response.with_data(item)
}

/// Drop the payload, keeping the outcome.
pub(crate) fn into_unit(response: ApiResponse) -> ApiResponse<()> {
    let unit = response.success.then_some(());
    response.with_data(unit)
}

fn decode<T: DeserializeOwned>(value: Value, shape: &'static str) -> Option<T> {
    if value.is_null() {
        return None;
    }
    match serde_json::from_value(value) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            tracing::warn!(shape, error = %e, "Unexpected response payload");
            None
        }
    }
}

/// Percent-encode an id for use as a single path segment.
pub(crate) fn segment(id: &str) -> String {
    let Ok(mut url) = url::Url::parse("http://localhost/") else {
        return id.to_string();
    };
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.clear().push(id);
    }
    url.path().trim_start_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::FailureKind;
    use serde_json::json;

    #[test]
    fn test_payload_unwrapping() {
        assert_eq!(payload(json!({"success": true, "data": [1]})), json!([1]));
        assert_eq!(
            payload(json!({"success": true, "data": {"data": [1], "total": 1}})),
            json!([1])
        );
        assert_eq!(
            payload(json!({"data": {"_id": "n1", "data": {"orderId": "o1"}}})),
            json!({"_id": "n1", "data": {"orderId": "o1"}})
        );
        assert_eq!(payload(json!([2])), json!([2]));
    }

    #[test]
    fn test_into_list_defaults_to_empty() {
        let ok: ApiResponse<Vec<u32>> = into_list(ApiResponse::ok(json!({"data": [1, 2]})));
        assert_eq!(ok.data, Some(vec![1, 2]));

        let wrong_shape: ApiResponse<Vec<u32>> = into_list(ApiResponse::ok(json!({"data": "x"})));
        assert!(wrong_shape.success);
        assert_eq!(wrong_shape.data, Some(vec![]));

        let failed: ApiResponse<Vec<u32>> =
            into_list(ApiResponse::failure(FailureKind::Offline, "down", None));
        assert!(!failed.success);
        assert!(failed.offline);
        assert_eq!(failed.data, Some(vec![]));
    }

    #[test]
    fn test_into_item_and_unit() {
        let item: ApiResponse<String> = into_item(ApiResponse::ok(json!({"data": "x"})));
        assert_eq!(item.data.as_deref(), Some("x"));

        let failed: ApiResponse<String> =
            into_item(ApiResponse::failure(FailureKind::Client, "nope", Some(404)));
        assert_eq!(failed.data, None);
        assert_eq!(failed.status, Some(404));

        assert_eq!(into_unit(ApiResponse::ok(json!(null))).data, Some(()));
    }

    #[test]
    fn test_segment_encoding() {
        assert_eq!(segment("64f1c0ffee"), "64f1c0ffee");
        assert_eq!(segment("a/b"), "a%2Fb");
        assert_eq!(segment("a b"), "a%20b");
        assert_eq!(segment("a+b"), "a+b");
        assert_eq!(segment("50%"), "50%25");
    }
}
