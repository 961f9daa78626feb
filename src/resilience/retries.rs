//! Retry state machine.
//!
//! ```text
//! Attempting(n) ──2xx──────────────────────────────▶ Success
//!      │ ──4xx (not 429)──────────────────────────▶ TerminalFailure(Client)
//!      │ ──429, n < max──▶ Backoff(n, retry-after | 429 backoff) ──▶ Attempting(n+1)
//!      │ ──429, n = max──────────────────────────▶ TerminalFailure(RateLimitExhausted)
//!      │ ──5xx/network/timeout, n < max──▶ Backoff(n, network backoff) ──▶ Attempting(n+1)
//!      └ ──5xx/network/timeout, n = max──────────▶ TerminalFailure(Offline)
//! ```
//!
//! [`RetryPolicy::transition`] is pure apart from the jitter source, which
//! the caller supplies.

use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;
use crate::resilience::backoff::{network_backoff, rate_limit_backoff};

/// What a single network attempt produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    RateLimited { retry_after: Option<Duration> },
    ClientError { status: u16 },
    ServerError { status: u16 },
    Network { timed_out: bool },
}

impl AttemptOutcome {
    /// Classify an HTTP status code.
    pub fn from_status(status: u16, retry_after: Option<Duration>) -> Self {
        match status {
            200..=299 => AttemptOutcome::Success,
            429 => AttemptOutcome::RateLimited { retry_after },
            400..=499 => AttemptOutcome::ClientError { status },
            _ => AttemptOutcome::ServerError { status },
        }
    }
}

/// Why a retry was scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReason {
    RateLimited,
    ServerError,
    Network,
    Timeout,
}

impl RetryReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetryReason::RateLimited => "rate_limited",
            RetryReason::ServerError => "server_error",
            RetryReason::Network => "network",
            RetryReason::Timeout => "timeout",
        }
    }
}

/// Why a request stopped without succeeding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalReason {
    /// Non-retryable 4xx.
    Client { status: u16 },
    /// Every attempt was answered with 429.
    RateLimitExhausted,
    /// 5xx or transport failures used up the budget.
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Attempting { attempt: u32 },
    Backoff { attempt: u32, delay: Duration, reason: RetryReason },
    Success,
    TerminalFailure(TerminalReason),
}

impl RetryState {
    pub const fn start() -> Self {
        RetryState::Attempting { attempt: 1 }
    }

    /// State after a backoff sleep has elapsed. Other states are unchanged.
    pub fn after_backoff(self) -> Self {
        match self {
            RetryState::Backoff { attempt, .. } => RetryState::Attempting {
                attempt: attempt + 1,
            },
            other => other,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RetryState::Success | RetryState::TerminalFailure(_))
    }
}

/// Attempt budget and backoff configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts.max(1)
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Next state after `attempt` produced `outcome`.
    pub fn transition<R: Rng + ?Sized>(
        &self,
        outcome: &AttemptOutcome,
        attempt: u32,
        rng: &mut R,
    ) -> RetryState {
        let attempts_left = attempt < self.max_attempts();

        match *outcome {
            AttemptOutcome::Success => RetryState::Success,
            AttemptOutcome::ClientError { status } => {
                RetryState::TerminalFailure(TerminalReason::Client { status })
            }
            AttemptOutcome::RateLimited { retry_after } => {
                if !attempts_left {
                    return RetryState::TerminalFailure(TerminalReason::RateLimitExhausted);
                }
                // A server hint never waits longer than our own backoff cap.
                let cap = Duration::from_millis(self.config.max_backoff_delay_ms);
                let delay = retry_after
                    .map(|hint| hint.min(cap))
                    .unwrap_or_else(|| rate_limit_backoff(attempt, &self.config, rng));
                RetryState::Backoff {
                    attempt,
                    delay,
                    reason: RetryReason::RateLimited,
                }
            }
            AttemptOutcome::ServerError { .. } | AttemptOutcome::Network { .. } => {
                if !attempts_left {
                    return RetryState::TerminalFailure(TerminalReason::Offline);
                }
                let reason = match outcome {
                    AttemptOutcome::Network { timed_out: true } => RetryReason::Timeout,
                    AttemptOutcome::Network { timed_out: false } => RetryReason::Network,
                    _ => RetryReason::ServerError,
                };
                RetryState::Backoff {
                    attempt,
                    delay: network_backoff(attempt, &self.config),
                    reason,
                }
            }
        }
    }
}
