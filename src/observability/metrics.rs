//! Metrics collection and exposition.
//!
//! # Metrics
//! - `meal_client_requests_total` (counter): requests by endpoint and outcome
//! - `meal_client_request_duration_seconds` (histogram): end-to-end latency incl. retries
//! - `meal_client_retries_total` (counter): scheduled retries by reason
//! - `meal_client_rate_limited_total` (counter): requests refused or throttled by stage
//! - `meal_client_dedup_joins_total` (counter): callers that joined an in-flight request
//! - `meal_client_cache_lookups_total` (counter): cache reads by result
//! - `meal_client_cache_entries` (gauge): entries held by the cache store
//!
//! Every recorder is a no-op until a recorder is installed, so library users
//! that never call [`init_metrics`] pay nothing.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a finished top-level request.
pub fn record_request(endpoint: &str, outcome: &'static str, start: Instant) {
    metrics::counter!(
        "meal_client_requests_total",
        "endpoint" => endpoint.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    metrics::histogram!("meal_client_request_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

/// Record a scheduled retry.
pub fn record_retry(reason: &'static str) {
    metrics::counter!("meal_client_retries_total", "reason" => reason).increment(1);
}

/// Record a request refused before reaching the network.
pub fn record_rate_limited(stage: &'static str) {
    metrics::counter!("meal_client_rate_limited_total", "stage" => stage).increment(1);
}

pub fn record_dedup_join() {
    metrics::counter!("meal_client_dedup_joins_total").increment(1);
}

/// Record a cache read: "fresh", "stale", "miss" or "expired".
pub fn record_cache_lookup(result: &'static str) {
    metrics::counter!("meal_client_cache_lookups_total", "result" => result).increment(1);
}

pub fn record_cache_size(entries: usize) {
    metrics::gauge!("meal_client_cache_entries").set(entries as f64);
}
