//! Token Store: persisted auth token with an in-memory freshness window.
//!
//! # Invariant
//! While `now - checked_at < ttl` and a value is cached, the cached value is
//! authoritative and storage is not touched. Otherwise storage is read and the
//! cache resynced.
//!
//! Storage failures are logged and degrade to "no token"; they never reach
//! the caller.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use crate::auth::storage::TokenStorage;

#[derive(Debug, Default)]
struct CachedToken {
    value: Option<String>,
    checked_at: Option<Instant>,
}

/// Auth token with a memory cache over a [`TokenStorage`] backend.
pub struct TokenStore {
    storage: Arc<dyn TokenStorage>,
    ttl: Duration,
    cached: Mutex<CachedToken>,
}

impl TokenStore {
    /// Create a store. `ttl` is how long the memory copy is trusted.
    pub fn new(storage: Arc<dyn TokenStorage>, ttl: Duration) -> Self {
        Self {
            storage,
            ttl,
            cached: Mutex::new(CachedToken::default()),
        }
    }

    /// Current token, from memory when fresh, otherwise from storage.
    pub async fn get_stored_token(&self) -> Option<String> {
        if let Some(token) = self.fresh_cached() {
            return Some(token);
        }

        let loaded = match self.storage.load().await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read stored token, continuing unauthenticated");
                None
            }
        };

        self.set_cached(loaded.clone());
        loaded
    }

    /// Persist a new token. The memory copy is refreshed even if the write fails.
    pub async fn store_token(&self, token: &str) {
        if let Err(e) = self.storage.save(token).await {
            tracing::warn!(error = %e, "Failed to persist token, keeping it in memory only");
        }
        self.set_cached(Some(token.to_string()));
        tracing::debug!("Auth token stored");
    }

    /// Forget the token everywhere.
    pub async fn remove_token(&self) {
        if let Err(e) = self.storage.clear().await {
            tracing::warn!(error = %e, "Failed to clear stored token");
        }
        self.set_cached(None);
        tracing::debug!("Auth token removed");
    }

    fn fresh_cached(&self) -> Option<String> {
        let cached = self.cached.lock().ok()?;
        let checked_at = cached.checked_at?;
        if checked_at.elapsed() < self.ttl {
            cached.value.clone()
        } else {
            None
        }
    }

    fn set_cached(&self, value: Option<String>) {
        if let Ok(mut cached) = self.cached.lock() {
            cached.checked_at = value.as_ref().map(|_| Instant::now());
            cached.value = value;
        }
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
