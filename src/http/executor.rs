//! Request Executor: one logical HTTP call with rate check, spacing, deadline and retries.
//!
//! # Flow
//! ```text
//! execute(spec)
//!     → rate limiter pre-check (refuse without I/O when limited)
//!     → minimum spacing since the previous start
//!     → Attempting(1) → send with deadline → classify
//!         → RetryPolicy::transition → Backoff → sleep → Attempting(n+1)
//!         → Success | TerminalFailure
//!     → ApiResponse
//! ```
//!
//! Never fails: every path ends in an [`ApiResponse`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::{HeaderValue, CONTENT_TYPE, RETRY_AFTER};
use reqwest::Client;
use serde_json::Value;
use url::Url;
use uuid::Uuid;

use crate::config::{ClientConfig, Environment};
use crate::error::{ClientError, ClientResult};
use crate::http::envelope::{build_error_message, parse_body, ApiResponse, FailureKind};
use crate::http::request::RequestSpec;
use crate::observability::metrics;
use crate::rate_limit::RateLimiter;
use crate::resilience::backoff::parse_retry_after;
use crate::resilience::timeouts::with_deadline;
use crate::resilience::{
    AttemptOutcome, MinIntervalThrottle, RetryPolicy, RetryState, TerminalReason,
};

/// Header carrying the API key in production builds.
pub const API_KEY_HEADER: &str = "x-api-key";
/// Header correlating client logs with server logs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// What one network attempt produced.
#[derive(Debug)]
struct AttemptResult {
    outcome: AttemptOutcome,
    status: Option<u16>,
    body: Value,
    transport_error: Option<String>,
}

/// Issues requests against one base URL.
pub struct RequestExecutor {
    client: Client,
    base_url: String,
    environment: Environment,
    api_key: Option<String>,
    timeout: Duration,
    policy: RetryPolicy,
    throttle: MinIntervalThrottle,
    limiter: Arc<dyn RateLimiter>,
}

impl RequestExecutor {
    /// Create an executor from configuration.
    pub fn new(config: &ClientConfig, limiter: Arc<dyn RateLimiter>) -> ClientResult<Self> {
        let base = Url::parse(&config.api.base_url).map_err(|e| ClientError::InvalidBaseUrl {
            url: config.api.base_url.clone(),
            reason: e.to_string(),
        })?;

        let mut builder = Client::builder().user_agent(config.api.user_agent.clone());
        if !config.api.use_system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            base_url: base.as_str().trim_end_matches('/').to_string(),
            environment: config.api.environment,
            api_key: config.api.api_key.clone().filter(|k| !k.is_empty()),
            timeout: config.api.request_timeout(),
            policy: RetryPolicy::new(config.retries.clone()),
            throttle: MinIntervalThrottle::new(Duration::from_millis(
                config.throttle.min_interval_ms,
            )),
            limiter,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for an endpoint.
    pub fn url_for(&self, endpoint: &str) -> String {
        if endpoint.is_empty() {
            self.base_url.clone()
        } else if endpoint.starts_with('/') {
            format!("{}{}", self.base_url, endpoint)
        } else {
            format!("{}/{}", self.base_url, endpoint)
        }
    }

    /// Run a request to completion.
    pub async fn execute(&self, spec: &RequestSpec) -> ApiResponse {
        let start = Instant::now();
        let request_id = Uuid::new_v4().to_string();
        let endpoint = spec.endpoint.as_str();
        let user_id = spec.user_id();
        let url = self.url_for(endpoint);

        if let Err(e) = Url::parse(&url) {
            tracing::error!(request_id = %request_id, url = %url, error = %e, "Invalid request URL");
            metrics::record_request(endpoint, "internal", start);
            return ApiResponse::failure(
                FailureKind::Internal,
                format!("Invalid request URL '{}': {}", url, e),
                None,
            );
        }

        let decision = self.limiter.should_rate_limit(endpoint, &user_id).await;
        if decision.should_limit {
            tracing::warn!(
                request_id = %request_id,
                endpoint = %endpoint,
                user_id = %user_id,
                remaining_ms = decision.remaining_delay.as_millis() as u64,
                "Request refused by client-side rate limit"
            );
            metrics::record_rate_limited("preflight");
            metrics::record_request(endpoint, "rate_limited", start);
            return ApiResponse::failure(FailureKind::RateLimited, decision.message(), None);
        }

        let waited = self.throttle.wait_turn().await;
        if !waited.is_zero() {
            tracing::trace!(request_id = %request_id, waited_ms = waited.as_millis() as u64, "Request spaced out");
        }

        let mut state = RetryState::start();
        let mut last: Option<AttemptResult> = None;
        let mut attempts = 0;

        loop {
            match state {
                RetryState::Attempting { attempt } => {
                    attempts = attempt;
                    let result = self.attempt(spec, &url, &request_id, attempt).await;
                    state = self
                        .policy
                        .transition(&result.outcome, attempt, &mut rand::thread_rng());
                    self.account(endpoint, &user_id, &result).await;
                    last = Some(result);
                }
                RetryState::Backoff {
                    attempt,
                    delay,
                    reason,
                } => {
                    tracing::info!(
                        request_id = %request_id,
                        endpoint = %endpoint,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        reason = reason.as_str(),
                        "Retrying request"
                    );
                    metrics::record_retry(reason.as_str());
                    tokio::time::sleep(delay).await;
                    state = state.after_backoff();
                }
                RetryState::Success | RetryState::TerminalFailure(_) => break,
            }
        }

        let response = finish(state, last);
        let outcome = match (response.success, response.kind) {
            (true, _) => "success",
            (false, Some(FailureKind::RateLimited)) => "rate_limited",
            (false, Some(FailureKind::Client)) => "client_error",
            (false, Some(FailureKind::Offline)) => "offline",
            (false, _) => "internal",
        };

        if response.success {
            tracing::debug!(request_id = %request_id, endpoint = %endpoint, attempts, "Request succeeded");
        } else {
            tracing::warn!(
                request_id = %request_id,
                endpoint = %endpoint,
                attempts,
                status = ?response.status,
                outcome,
                error = ?response.error,
                "Request failed"
            );
        }
        metrics::record_request(endpoint, outcome, start);
        response
    }

    async fn attempt(
        &self,
        spec: &RequestSpec,
        url: &str,
        request_id: &str,
        attempt: u32,
    ) -> AttemptResult {
        let mut builder = self
            .client
            .request(spec.method.clone(), url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .header(REQUEST_ID_HEADER, request_id);

        if let Some(token) = &spec.token {
            builder = builder.bearer_auth(token);
        }
        if self.environment.is_production() {
            if let Some(key) = &self.api_key {
                builder = builder.header(API_KEY_HEADER, key);
            }
        }
        if let Some(body) = &spec.body {
            builder = builder.json(body);
        }

        tracing::debug!(
            request_id = %request_id,
            method = %spec.method,
            url = %url,
            attempt,
            "Sending request"
        );

        let exchange = async {
            let response = builder.send().await?;
            let status = response.status().as_u16();
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let text = response.text().await?;
            Ok::<_, reqwest::Error>((status, retry_after, text))
        };

        match with_deadline(self.timeout, exchange).await {
            Ok(Ok((status, retry_after, text))) => {
                tracing::debug!(request_id = %request_id, status, attempt, "Received response");
                AttemptResult {
                    outcome: AttemptOutcome::from_status(status, retry_after),
                    status: Some(status),
                    body: parse_body(&text),
                    transport_error: None,
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(request_id = %request_id, attempt, error = %e, "Transport error");
                AttemptResult {
                    outcome: AttemptOutcome::Network {
                        timed_out: e.is_timeout(),
                    },
                    status: None,
                    body: Value::Null,
                    transport_error: Some(e.to_string()),
                }
            }
            Err(timeout) => {
                tracing::warn!(request_id = %request_id, attempt, error = %timeout, "Attempt timed out");
                AttemptResult {
                    outcome: AttemptOutcome::Network { timed_out: true },
                    status: None,
                    body: Value::Null,
                    transport_error: Some(timeout.to_string()),
                }
            }
        }
    }

    async fn account(&self, endpoint: &str, user_id: &str, result: &AttemptResult) {
        match result.outcome {
            AttemptOutcome::Success => self.limiter.record_success(endpoint, user_id).await,
            AttemptOutcome::RateLimited { .. } | AttemptOutcome::ServerError { .. } => {
                self.limiter
                    .record_failure(endpoint, user_id, result.status)
                    .await
            }
            AttemptOutcome::ClientError { .. } | AttemptOutcome::Network { .. } => {}
        }
    }
}

/// Turn the final state and last attempt into an envelope.
fn finish(state: RetryState, last: Option<AttemptResult>) -> ApiResponse {
    let Some(last) = last else {
        return ApiResponse::failure(FailureKind::Internal, "Request was never attempted", None);
    };

    match state {
        RetryState::Success => {
            let mut response = ApiResponse::ok(last.body);
            response.status = last.status;
            response
        }
        RetryState::TerminalFailure(TerminalReason::Client { status }) => ApiResponse::failure(
            FailureKind::Client,
            build_error_message(&last.body, status),
            Some(status),
        ),
        RetryState::TerminalFailure(TerminalReason::RateLimitExhausted) => ApiResponse::failure(
            FailureKind::RateLimited,
            build_error_message(&last.body, 429),
            Some(429),
        ),
        RetryState::TerminalFailure(TerminalReason::Offline)
        | RetryState::Attempting { .. }
        | RetryState::Backoff { .. } => {
            let error = match (last.status, last.transport_error) {
                (Some(status), _) => build_error_message(&last.body, status),
                (None, Some(transport)) => format!("Network request failed: {}", transport),
                (None, None) => "Network request failed".to_string(),
            };
            ApiResponse::failure(FailureKind::Offline, error, last.status)
        }
    }
}

impl std::fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("base_url", &self.base_url)
            .field("environment", &self.environment)
            .field("timeout", &self.timeout)
            .field("max_attempts", &self.policy.max_attempts())
            .finish()
    }
}
