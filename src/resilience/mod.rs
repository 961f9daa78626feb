//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to backend:
//!     → throttle.rs (space out request starts)
//!     → timeouts.rs (deadline per attempt)
//!     → On failure: retries.rs (classify outcome, decide next state)
//!         → backoff.rs (429 backoff with jitter | plain network backoff)
//! ```
//!
//! # Design Decisions
//! - Every network attempt has a deadline
//! - Client errors (4xx except 429) are never retried
//! - 429 and network backoff are separate policies
//! - Attempts for one request are strictly sequential

pub mod backoff;
pub mod retries;
pub mod throttle;
pub mod timeouts;

pub use retries::{AttemptOutcome, RetryPolicy, RetryReason, RetryState, TerminalReason};
pub use throttle::MinIntervalThrottle;
