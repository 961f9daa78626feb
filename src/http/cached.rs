//! Cached-Request Orchestrator (stale-while-revalidate).
//!
//! | Cache state   | Returned                 | Network                          |
//! |---------------|--------------------------|----------------------------------|
//! | force refresh | fetched envelope         | one fetch, cache written on success |
//! | fresh hit     | cached, `fromCache=true` | none                             |
//! | stale hit     | cached, `fromCache=true` | one tracked background refresh   |
//! | miss          | fetched envelope         | one fetch, cache written on success |
//!
//! Background refreshes go through the deduplicator like any other request,
//! so overlapping refreshes of the same entry collapse there. They are
//! tracked so short-lived callers (the CLI) can await them before exiting.

use std::sync::{Arc, Mutex};

use tokio::task::JoinSet;

use crate::cache::{CacheKey, CacheStore, CacheType};
use crate::http::dedup::Deduplicator;
use crate::http::envelope::ApiResponse;
use crate::http::request::RequestSpec;

/// Per-call cache options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheOptions {
    /// Skip the cache read and always fetch.
    pub force_refresh: bool,
    /// Narrows the cache entry, e.g. a resource id.
    pub scope: Option<String>,
}

impl CacheOptions {
    pub fn refresh() -> Self {
        Self {
            force_refresh: true,
            scope: None,
        }
    }

    pub fn scoped(scope: impl Into<String>) -> Self {
        Self {
            force_refresh: false,
            scope: Some(scope.into()),
        }
    }

    pub fn force_refresh(mut self, force: bool) -> Self {
        self.force_refresh = force;
        self
    }
}

#[derive(Clone)]
pub struct CachedRequester {
    dedup: Arc<Deduplicator>,
    cache: Arc<dyn CacheStore>,
    refreshes: Arc<Mutex<JoinSet<()>>>,
}

impl CachedRequester {
    pub fn new(dedup: Arc<Deduplicator>, cache: Arc<dyn CacheStore>) -> Self {
        Self {
            dedup,
            cache,
            refreshes: Arc::new(Mutex::new(JoinSet::new())),
        }
    }

    /// Wait for every background refresh spawned so far to store its result.
    pub async fn wait_for_refreshes(&self) {
        let mut pending = match self.refreshes.lock() {
            Ok(mut set) => std::mem::take(&mut *set),
            Err(_) => return,
        };
        while let Some(joined) = pending.join_next().await {
            if let Err(e) = joined {
                tracing::warn!(error = %e, "Background refresh task failed");
            }
        }
    }

    pub async fn cached_request(
        &self,
        spec: RequestSpec,
        cache_type: CacheType,
        options: CacheOptions,
    ) -> ApiResponse {
        let mut key = CacheKey::new(cache_type, spec.user_id());
        if let Some(scope) = options.scope {
            key = key.scoped(scope);
        }

        if options.force_refresh {
            tracing::debug!(resource = %key.resource(), "Forced refresh");
            return self.fetch_and_store(spec, &key).await;
        }

        match self.cache.get(&key).await {
            Some(hit) if !hit.is_stale => {
                tracing::debug!(resource = %key.resource(), source = ?hit.source, "Serving fresh cache entry");
                hit.data.cached()
            }
            Some(hit) => {
                tracing::debug!(resource = %key.resource(), source = ?hit.source, "Serving stale cache entry, revalidating");
                self.spawn_refresh(spec, key);
                hit.data.cached()
            }
            None => self.fetch_and_store(spec, &key).await,
        }
    }

    async fn fetch_and_store(&self, spec: RequestSpec, key: &CacheKey) -> ApiResponse {
        let response = self.dedup.deduplicate(spec).await;
        if response.success {
            self.cache.set(key, response.clone()).await;
        }
        response
    }

    fn spawn_refresh(&self, spec: RequestSpec, key: CacheKey) {
        let dedup = self.dedup.clone();
        let cache = self.cache.clone();

        let refresh = async move {
            let response = dedup.deduplicate(spec).await;
            if response.success {
                cache.set(&key, response).await;
                tracing::debug!(resource = %key.resource(), "Background refresh stored");
            } else {
                tracing::warn!(
                    resource = %key.resource(),
                    error = ?response.error,
                    "Background refresh failed, keeping stale entry"
                );
            }
        };

        match self.refreshes.lock() {
            Ok(mut set) => {
                // Reap finished refreshes so the set only holds live ones.
                while set.try_join_next().is_some() {}
                set.spawn(refresh);
            }
            Err(_) => {
                tokio::spawn(refresh);
            }
        }
    }
}

impl std::fmt::Debug for CachedRequester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedRequester")
            .field("dedup", &self.dedup)
            .finish_non_exhaustive()
    }
}
