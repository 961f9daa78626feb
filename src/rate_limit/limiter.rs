//! Sliding-window request accounting per (endpoint, user).

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::config::RateLimitConfig;

/// Outcome of a pre-flight check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub should_limit: bool,
    /// How long until a request would be allowed. Zero when not limited.
    pub remaining_delay: Duration,
}

impl RateLimitDecision {
    pub const fn allow() -> Self {
        Self {
            should_limit: false,
            remaining_delay: Duration::ZERO,
        }
    }

    pub const fn limit(remaining_delay: Duration) -> Self {
        Self {
            should_limit: true,
            remaining_delay,
        }
    }

    /// Wait message shown to users.
    pub fn message(&self) -> String {
        format!(
            "Too many requests. Please wait {} before trying again.",
            format_wait(self.remaining_delay)
        )
    }
}

/// The rate accounting collaborator consulted before every request.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Decide whether a request may go out now. Allowed requests are counted.
    async fn should_rate_limit(&self, endpoint: &str, user_id: &str) -> RateLimitDecision;

    async fn record_success(&self, endpoint: &str, user_id: &str);

    /// Record a failed response. A 429 starts or extends a cooldown.
    async fn record_failure(&self, endpoint: &str, user_id: &str, status: Option<u16>);
}

#[derive(Debug, Default)]
struct Window {
    hits: VecDeque<Instant>,
    consecutive_throttles: u32,
    blocked_until: Option<Instant>,
}

impl Window {
    /// No hit inside the window and no active cooldown.
    fn is_idle(&self, now: Instant, window_len: Duration) -> bool {
        let cooled = self.blocked_until.map_or(true, |until| until <= now);
        let quiet = self
            .hits
            .back()
            .map_or(true, |last| now.duration_since(*last) >= window_len);
        cooled && quiet
    }
}

#[derive(Debug, Default)]
struct Windows {
    by_key: HashMap<String, Window>,
    last_sweep: Option<Instant>,
}

impl Windows {
    /// Drop idle windows, at most once per window length.
    ///
    /// Endpoints carry resource ids, so keys would otherwise accumulate for
    /// the life of the client.
    fn sweep(&mut self, now: Instant, window_len: Duration) {
        let due = self
            .last_sweep
            .map_or(true, |last| now.duration_since(last) >= window_len);
        if !due {
            return;
        }
        self.last_sweep = Some(now);

        let before = self.by_key.len();
        self.by_key.retain(|_, window| !window.is_idle(now, window_len));
        let dropped = before - self.by_key.len();
        if dropped > 0 {
            tracing::trace!(dropped, remaining = self.by_key.len(), "Idle rate windows dropped");
        }
    }
}

/// In-memory sliding window limiter.
pub struct SlidingWindowLimiter {
    windows: Mutex<Windows>,
    config: RateLimitConfig,
}

impl SlidingWindowLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            windows: Mutex::new(Windows::default()),
            config,
        }
    }

    fn key(endpoint: &str, user_id: &str) -> String {
        format!("{}|{}", user_id, endpoint)
    }

    fn check(&self, key: String, now: Instant) -> RateLimitDecision {
        if !self.config.enabled {
            return RateLimitDecision::allow();
        }

        let window_len = Duration::from_millis(self.config.window_ms);
        let Ok(mut windows) = self.windows.lock() else {
            return RateLimitDecision::allow();
        };
        windows.sweep(now, window_len);
        let window = windows.by_key.entry(key).or_default();

        if let Some(until) = window.blocked_until {
            if until > now {
                return RateLimitDecision::limit(until - now);
            }
            window.blocked_until = None;
        }

        while let Some(oldest) = window.hits.front() {
            if now.duration_since(*oldest) >= window_len {
                window.hits.pop_front();
            } else {
                break;
            }
        }

        if window.hits.len() >= self.config.max_requests as usize {
            let oldest = window.hits.front().copied().unwrap_or(now);
            let wait = (oldest + window_len).saturating_duration_since(now);
            return RateLimitDecision::limit(wait);
        }

        window.hits.push_back(now);
        RateLimitDecision::allow()
    }

    fn cooldown(&self, consecutive: u32) -> Duration {
        let factor = 2u64.saturating_pow(consecutive.saturating_sub(1));
        let ms = self
            .config
            .cooldown_base_ms
            .saturating_mul(factor)
            .min(self.config.cooldown_max_ms);
        Duration::from_millis(ms)
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.windows.lock().map(|w| w.by_key.len()).unwrap_or(0)
    }
}

#[async_trait]
impl RateLimiter for SlidingWindowLimiter {
    async fn should_rate_limit(&self, endpoint: &str, user_id: &str) -> RateLimitDecision {
        self.check(Self::key(endpoint, user_id), Instant::now())
    }

    async fn record_success(&self, endpoint: &str, user_id: &str) {
        if let Ok(mut windows) = self.windows.lock() {
            if let Some(window) = windows.by_key.get_mut(&Self::key(endpoint, user_id)) {
                window.consecutive_throttles = 0;
                window.blocked_until = None;
            }
        }
    }

    async fn record_failure(&self, endpoint: &str, user_id: &str, status: Option<u16>) {
        if !self.config.enabled || status != Some(429) {
            return;
        }
        if let Ok(mut windows) = self.windows.lock() {
            let window = windows.by_key.entry(Self::key(endpoint, user_id)).or_default();
            window.consecutive_throttles += 1;
            let cooldown = self.cooldown(window.consecutive_throttles);
            window.blocked_until = Some(Instant::now() + cooldown);
            tracing::warn!(
                endpoint = %endpoint,
                user_id = %user_id,
                cooldown_ms = cooldown.as_millis() as u64,
                "Server rate limit hit, cooling down"
            );
        }
    }
}

/// Limiter that never limits. Useful for tests and trusted backends.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLimiter;

#[async_trait]
impl RateLimiter for NoopLimiter {
    async fn should_rate_limit(&self, _endpoint: &str, _user_id: &str) -> RateLimitDecision {
        RateLimitDecision::allow()
    }

    async fn record_success(&self, _endpoint: &str, _user_id: &str) {}

    async fn record_failure(&self, _endpoint: &str, _user_id: &str, _status: Option<u16>) {}
}

/// Human-readable wait time, rounded up to whole seconds or minutes.
pub fn format_wait(delay: Duration) -> String {
    let secs = delay.as_millis().div_ceil(1000).max(1) as u64;
    if secs < 60 {
        plural(secs, "second")
    } else {
        plural(secs.div_ceil(60), "minute")
    }
}

fn plural(n: u64, unit: &str) -> String {
    if n == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", n, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_requests: u32) -> RateLimitConfig {
        RateLimitConfig {
            enabled: true,
            window_ms: 1000,
            max_requests,
            cooldown_base_ms: 500,
            cooldown_max_ms: 1500,
        }
    }

    #[test]
    fn test_window_limits_per_key() {
        let limiter = SlidingWindowLimiter::new(config(2));
        let now = Instant::now();

        assert!(!limiter.check("a".into(), now).should_limit);
        assert!(!limiter.check("a".into(), now).should_limit);

        let decision = limiter.check("a".into(), now + Duration::from_millis(400));
        assert!(decision.should_limit);
        assert_eq!(decision.remaining_delay, Duration::from_millis(600));

        // Separate key, separate window.
        assert!(!limiter.check("b".into(), now).should_limit);

        // Window slides.
        assert!(!limiter.check("a".into(), now + Duration::from_millis(1000)).should_limit);
    }

    #[test]
    fn test_disabled_never_limits() {
        let mut cfg = config(1);
        cfg.enabled = false;
        let limiter = SlidingWindowLimiter::new(cfg);
        let now = Instant::now();
        for _ in 0..10 {
            assert!(!limiter.check("a".into(), now).should_limit);
        }
    }

    #[test]
    fn test_cooldown_growth_is_capped() {
        let limiter = SlidingWindowLimiter::new(config(10));
        assert_eq!(limiter.cooldown(1), Duration::from_millis(500));
        assert_eq!(limiter.cooldown(2), Duration::from_millis(1000));
        assert_eq!(limiter.cooldown(3), Duration::from_millis(1500));
        assert_eq!(limiter.cooldown(30), Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_cooldown_and_reset() {
        let limiter = SlidingWindowLimiter::new(config(10));

        limiter.record_failure("/orders", "u1", Some(500)).await;
        assert!(!limiter.should_rate_limit("/orders", "u1").await.should_limit);

        limiter.record_failure("/orders", "u1", Some(429)).await;
        let decision = limiter.should_rate_limit("/orders", "u1").await;
        assert!(decision.should_limit);
        assert_eq!(decision.remaining_delay, Duration::from_millis(500));

        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(!limiter.should_rate_limit("/orders", "u1").await.should_limit);

        limiter.record_failure("/orders", "u1", Some(429)).await;
        limiter.record_success("/orders", "u1").await;
        assert!(!limiter.should_rate_limit("/orders", "u1").await.should_limit);
    }

    #[test]
    fn test_idle_windows_are_dropped() {
        let limiter = SlidingWindowLimiter::new(config(10));
        let start = Instant::now();

        for i in 0..1000 {
            limiter.check(format!("u1|/mealplans/{}", i), start);
        }
        assert_eq!(limiter.tracked_keys(), 1000);

        limiter.check("u1|/orders".into(), start + Duration::from_secs(3600));
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[test]
    fn test_sweep_keeps_busy_and_cooling_windows() {
        let limiter = SlidingWindowLimiter::new(config(10));
        let start = Instant::now();

        limiter.check("old".into(), start);
        limiter.check("busy".into(), start + Duration::from_millis(900));
        if let Ok(mut windows) = limiter.windows.lock() {
            windows.by_key.entry("cooling".into()).or_default().blocked_until =
                Some(start + Duration::from_secs(10));
        }

        limiter.check("new".into(), start + Duration::from_millis(1200));

        let windows = limiter.windows.lock().unwrap();
        assert!(!windows.by_key.contains_key("old"));
        assert!(windows.by_key.contains_key("busy"));
        assert!(windows.by_key.contains_key("cooling"));
        assert!(windows.by_key.contains_key("new"));
    }

    #[test]
    fn test_format_wait() {
        assert_eq!(format_wait(Duration::from_millis(10)), "1 second");
        assert_eq!(format_wait(Duration::from_millis(2500)), "3 seconds");
        assert_eq!(format_wait(Duration::from_secs(60)), "1 minute");
        assert_eq!(format_wait(Duration::from_secs(61)), "2 minutes");
        assert_eq!(
            RateLimitDecision::limit(Duration::from_secs(5)).message(),
            "Too many requests. Please wait 5 seconds before trying again."
        );
    }
}
