//! Deduplicator: identical in-flight requests share one execution.
//!
//! The first caller for a key spawns the execution as a task and registers a
//! shared handle to it; later callers with the same key await that handle.
//! The task removes its own entry when it settles, so the map never keeps a
//! dangling entry even if every caller has gone away.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt, Shared};

use crate::http::envelope::{ApiResponse, FailureKind};
use crate::http::executor::RequestExecutor;
use crate::http::request::RequestSpec;
use crate::observability::metrics;

type SharedResponse = Shared<BoxFuture<'static, ApiResponse>>;

#[derive(Clone)]
struct PendingRequest {
    id: u64,
    response: SharedResponse,
}

pub struct Deduplicator {
    executor: Arc<RequestExecutor>,
    pending: Arc<DashMap<String, PendingRequest>>,
    next_id: AtomicU64,
}

impl Deduplicator {
    pub fn new(executor: Arc<RequestExecutor>) -> Self {
        Self {
            executor,
            pending: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Number of distinct requests currently in flight.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// Execute `spec`, joining an identical in-flight request if there is one.
    pub async fn deduplicate(&self, spec: RequestSpec) -> ApiResponse {
        let key = spec.dedup_key(&self.executor.url_for(&spec.endpoint));

        let response = match self.pending.entry(key.clone()) {
            Entry::Occupied(entry) => {
                tracing::debug!(key = %key, "Joining in-flight request");
                metrics::record_dedup_join();
                entry.get().response.clone()
            }
            Entry::Vacant(entry) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let response = self.spawn(key, id, spec);
                entry.insert(PendingRequest {
                    id,
                    response: response.clone(),
                });
                response
            }
        };

        response.await
    }

    fn spawn(&self, key: String, id: u64, spec: RequestSpec) -> SharedResponse {
        let executor = self.executor.clone();
        let pending = self.pending.clone();

        let handle = tokio::spawn(async move {
            let response = executor.execute(&spec).await;
            pending.remove_if(&key, |_, entry| entry.id == id);
            response
        });

        async move {
            handle.await.unwrap_or_else(|e| {
                tracing::error!(error = %e, "Request task failed");
                ApiResponse::failure(FailureKind::Internal, "Request task failed", None)
            })
        }
        .boxed()
        .shared()
    }
}

impl std::fmt::Debug for Deduplicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deduplicator")
            .field("in_flight", &self.pending.len())
            .finish()
    }
}
