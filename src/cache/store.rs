//! Cache Store: envelopes keyed by (resource type, user id) with freshness metadata.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::cache::{CachePolicies, CacheType};
use crate::error::StorageError;
use crate::http::ApiResponse;
use crate::observability::metrics;

/// Identifies one cached resource for one user.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub cache_type: CacheType,
    /// Narrows the resource, e.g. a meal plan id.
    pub scope: Option<String>,
    pub user_id: String,
}

impl CacheKey {
    pub fn new(cache_type: CacheType, user_id: impl Into<String>) -> Self {
        Self {
            cache_type,
            scope: None,
            user_id: user_id.into(),
        }
    }

    pub fn scoped(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Resource type as stored, e.g. "meal_plan:42".
    pub fn resource(&self) -> String {
        match &self.scope {
            Some(scope) => format!("{}:{}", self.cache_type, scope),
            None => self.cache_type.to_string(),
        }
    }
}

/// Where a cached value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheSource {
    /// Written during this process' lifetime.
    Memory,
    /// Loaded from the persistence file.
    Persistent,
}

/// A cache hit.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedValue {
    pub data: ApiResponse,
    pub is_stale: bool,
    pub source: CacheSource,
}

/// Counters describing cache behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub fresh_hits: u64,
    pub stale_hits: u64,
    pub misses: u64,
    pub expired: u64,
    pub writes: u64,
}

/// The cache collaborator consumed by the cached-request orchestrator.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Look up an entry. Expired entries are evicted and reported as misses.
    async fn get(&self, key: &CacheKey) -> Option<CachedValue>;

    /// Insert or replace an entry, stamped with the current time.
    async fn set(&self, key: &CacheKey, data: ApiResponse);

    /// Drop every entry of `cache_type` for `user_id`, all scopes included.
    async fn clear(&self, cache_type: CacheType, user_id: &str);

    /// Drop everything.
    async fn clear_all(&self);

    fn stats(&self) -> CacheStats;
}

#[derive(Debug, Clone)]
struct CacheEntry {
    data: ApiResponse,
    stored_at_ms: u64,
    source: CacheSource,
}

#[derive(Serialize, Deserialize)]
struct PersistedEntry {
    cache_type: String,
    scope: Option<String>,
    user_id: String,
    stored_at_ms: u64,
    data: ApiResponse,
}

#[derive(Debug, Default)]
struct Counters {
    fresh_hits: AtomicU64,
    stale_hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
    writes: AtomicU64,
}

/// A thread-safe in-memory cache with optional JSON file persistence.
#[derive(Clone)]
pub struct MemoryCacheStore {
    inner: Arc<DashMap<CacheKey, CacheEntry>>,
    policies: Arc<CachePolicies>,
    counters: Arc<Counters>,
    persistence_path: Option<PathBuf>,
}

impl MemoryCacheStore {
    /// Create a new empty cache.
    pub fn new(policies: CachePolicies, persistence_path: Option<PathBuf>) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            policies: Arc::new(policies),
            counters: Arc::new(Counters::default()),
            persistence_path,
        }
    }

    /// Create a cache and load `path` if it exists. Expired entries are skipped.
    pub fn load_from_file(policies: CachePolicies, path: &Path) -> Result<Self, StorageError> {
        let cache = Self::new(policies, Some(path.to_path_buf()));
        if !path.exists() {
            return Ok(cache);
        }

        let reader = BufReader::new(File::open(path)?);
        let entries: Vec<PersistedEntry> = serde_json::from_reader(reader)?;
        let now = now_ms();

        for entry in entries {
            let Some(cache_type) = CacheType::from_name(&entry.cache_type) else {
                tracing::debug!(cache_type = %entry.cache_type, "Skipping unknown cache type");
                continue;
            };
            let policy = cache.policies.policy_for(cache_type);
            if now.saturating_sub(entry.stored_at_ms) >= policy.max_age_secs * 1000 {
                continue;
            }
            let key = CacheKey {
                cache_type,
                scope: entry.scope,
                user_id: entry.user_id,
            };
            cache.inner.insert(
                key,
                CacheEntry {
                    data: entry.data,
                    stored_at_ms: entry.stored_at_ms,
                    source: CacheSource::Persistent,
                },
            );
        }

        metrics::record_cache_size(cache.inner.len());
        tracing::info!(entries = cache.inner.len(), path = %path.display(), "Loaded cache file");
        Ok(cache)
    }

    /// Save to the persistence path, if one is configured.
    pub fn save_to_file(&self) -> Result<(), StorageError> {
        let Some(path) = &self.persistence_path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let entries: Vec<PersistedEntry> = self
            .inner
            .iter()
            .map(|r| PersistedEntry {
                cache_type: r.key().cache_type.as_str().to_string(),
                scope: r.key().scope.clone(),
                user_id: r.key().user_id.clone(),
                stored_at_ms: r.value().stored_at_ms,
                data: r.value().data.clone(),
            })
            .collect();

        // Write a sibling file and rename it over the target, so an interrupted
        // save never leaves a truncated cache behind.
        let tmp_path = temp_path_for(path);
        let mut writer = BufWriter::new(File::create(&tmp_path)?);
        serde_json::to_writer(&mut writer, &entries)?;
        writer.flush()?;
        drop(writer);
        std::fs::rename(&tmp_path, path)?;
        tracing::info!(entries = entries.len(), path = %path.display(), "Saved cache file");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn lookup(&self, key: &CacheKey, now: u64) -> Option<CachedValue> {
        let policy = self.policies.policy_for(key.cache_type);

        let (age_ms, value) = {
            let entry = self.inner.get(key)?;
            let age_ms = now.saturating_sub(entry.stored_at_ms);
            let value = CachedValue {
                data: entry.data.clone(),
                is_stale: age_ms >= policy.fresh_for_secs * 1000,
                source: entry.source,
            };
            (age_ms, value)
        };

        if age_ms >= policy.max_age_secs * 1000 {
            self.inner.remove(key);
            self.counters.expired.fetch_add(1, Ordering::Relaxed);
            metrics::record_cache_lookup("expired");
            metrics::record_cache_size(self.inner.len());
            return None;
        }

        Some(value)
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &CacheKey) -> Option<CachedValue> {
        match self.lookup(key, now_ms()) {
            Some(value) if value.is_stale => {
                self.counters.stale_hits.fetch_add(1, Ordering::Relaxed);
                metrics::record_cache_lookup("stale");
                Some(value)
            }
            Some(value) => {
                self.counters.fresh_hits.fetch_add(1, Ordering::Relaxed);
                metrics::record_cache_lookup("fresh");
                Some(value)
            }
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                metrics::record_cache_lookup("miss");
                None
            }
        }
    }

    async fn set(&self, key: &CacheKey, data: ApiResponse) {
        let mut data = data;
        data.from_cache = false;
        self.inner.insert(
            key.clone(),
            CacheEntry {
                data,
                stored_at_ms: now_ms(),
                source: CacheSource::Memory,
            },
        );
        self.counters.writes.fetch_add(1, Ordering::Relaxed);
        metrics::record_cache_size(self.inner.len());
        tracing::debug!(resource = %key.resource(), user_id = %key.user_id, "Cache entry written");
    }

    async fn clear(&self, cache_type: CacheType, user_id: &str) {
        self.inner
            .retain(|k, _| !(k.cache_type == cache_type && k.user_id == user_id));
        metrics::record_cache_size(self.inner.len());
    }

    async fn clear_all(&self) {
        self.inner.clear();
        metrics::record_cache_size(0);
        tracing::debug!("Cache cleared");
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.inner.len(),
            fresh_hits: self.counters.fresh_hits.load(Ordering::Relaxed),
            stale_hits: self.counters.stale_hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            expired: self.counters.expired.load(Ordering::Relaxed),
            writes: self.counters.writes.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for MemoryCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCacheStore")
            .field("entries", &self.inner.len())
            .field("persistence_path", &self.persistence_path)
            .finish()
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "cache".into());
    name.push(".tmp");
    path.with_file_name(name)
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
