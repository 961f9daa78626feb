//! Backoff delays.
//!
//! Two separate policies:
//! - 429: `min(base * multiplier^attempt, max)` plus up to one second of
//!   random jitter, so clients sharing a server-side limit spread out.
//! - network / 5xx: `min(base * 2^attempt, cap)`, no jitter.

use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;

/// 429 delay for `attempt` before jitter.
pub fn rate_limit_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let raw = config.base_delay_ms as f64 * config.backoff_multiplier.powi(exponent);
    let capped = raw.min(config.max_backoff_delay_ms as f64);
    Duration::from_millis(capped.max(0.0) as u64)
}

/// 429 delay for `attempt` with jitter in `[0, max_jitter_ms)`.
pub fn rate_limit_backoff<R: Rng + ?Sized>(
    attempt: u32,
    config: &RetryConfig,
    rng: &mut R,
) -> Duration {
    let jitter = if config.max_jitter_ms > 0 {
        rng.gen_range(0..config.max_jitter_ms)
    } else {
        0
    };
    rate_limit_delay(attempt, config) + Duration::from_millis(jitter)
}

/// Network / 5xx delay for `attempt`.
pub fn network_backoff(attempt: u32, config: &RetryConfig) -> Duration {
    let factor = 2u64.saturating_pow(attempt);
    let delay_ms = config
        .network_base_delay_ms
        .saturating_mul(factor)
        .min(config.network_max_delay_ms);
    Duration::from_millis(delay_ms)
}

/// Parse a `Retry-After` value given in seconds.
///
/// HTTP-date values are not supported and yield `None`.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let secs: f64 = value.trim().parse().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some(Duration::from_millis((secs * 1000.0) as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_rate_limit_delay_is_monotonic_and_capped() {
        let config = RetryConfig {
            max_attempts: 8,
            ..RetryConfig::default()
        };

        let mut previous = Duration::ZERO;
        for attempt in 1..config.max_attempts {
            let delay = rate_limit_delay(attempt, &config);
            assert!(delay >= previous, "attempt {} went backwards", attempt);
            assert!(delay <= Duration::from_millis(config.max_backoff_delay_ms));
            previous = delay;
        }
        assert_eq!(rate_limit_delay(1, &config), Duration::from_millis(2000));
        assert_eq!(rate_limit_delay(20, &config), Duration::from_millis(30_000));
    }

    #[test]
    fn test_jitter_bounds() {
        let config = RetryConfig::default();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let delay = rate_limit_backoff(2, &config, &mut rng);
            assert!(delay >= Duration::from_millis(4000));
            assert!(delay < Duration::from_millis(5000));
        }

        let no_jitter = RetryConfig {
            max_jitter_ms: 0,
            ..RetryConfig::default()
        };
        assert_eq!(
            rate_limit_backoff(2, &no_jitter, &mut rng),
            Duration::from_millis(4000)
        );
    }

    #[test]
    fn test_network_backoff() {
        let config = RetryConfig::default();
        assert_eq!(network_backoff(1, &config), Duration::from_millis(2000));
        assert_eq!(network_backoff(2, &config), Duration::from_millis(4000));
        assert_eq!(network_backoff(3, &config), Duration::from_millis(5000));
        assert_eq!(network_backoff(64, &config), Duration::from_millis(5000));
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after("1"), Some(Duration::from_millis(1000)));
        assert_eq!(parse_retry_after(" 2.5 "), Some(Duration::from_millis(2500)));
        assert_eq!(parse_retry_after("-1"), None);
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }
}
