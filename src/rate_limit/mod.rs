//! Client-side rate accounting.
//!
//! The executor asks [`RateLimiter::should_rate_limit`] once per request,
//! before any network I/O, and reports outcomes back so a server 429 puts the
//! (endpoint, user) pair into a cooldown.

pub mod limiter;

pub use limiter::{format_wait, NoopLimiter, RateLimitDecision, RateLimiter, SlidingWindowLimiter};
