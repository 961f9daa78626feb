//! Minimum spacing between request starts.
//!
//! Independent of the rate limiter: every request waits its turn, and turns
//! are at least `min_interval` apart. Completions are not serialized.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug)]
pub struct MinIntervalThrottle {
    min_interval: Duration,
    last_start: Mutex<Option<Instant>>,
}

impl MinIntervalThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_start: Mutex::new(None),
        }
    }

    /// Wait until `min_interval` has passed since the previous start, then claim this start.
    ///
    /// Returns how long the caller was held back.
    pub async fn wait_turn(&self) -> Duration {
        // Held across the sleep so concurrent callers queue up in order.
        let mut last_start = self.last_start.lock().await;
        let now = Instant::now();

        let waited = match *last_start {
            Some(previous) => {
                let ready_at = previous + self.min_interval;
                if ready_at > now {
                    tokio::time::sleep_until(ready_at).await;
                    ready_at - now
                } else {
                    Duration::ZERO
                }
            }
            None => Duration::ZERO,
        };

        *last_start = Some(Instant::now());
        waited
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_spacing() {
        let throttle = MinIntervalThrottle::new(Duration::from_millis(200));

        assert_eq!(throttle.wait_turn().await, Duration::ZERO);
        assert_eq!(throttle.wait_turn().await, Duration::from_millis(200));

        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(throttle.wait_turn().await, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_starts_are_serialized() {
        let throttle = Arc::new(MinIntervalThrottle::new(Duration::from_millis(100)));
        let start = Instant::now();

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let throttle = throttle.clone();
                tokio::spawn(async move {
                    throttle.wait_turn().await;
                    Instant::now()
                })
            })
            .collect();

        let mut starts = Vec::new();
        for handle in handles {
            starts.push(handle.await.unwrap() - start);
        }
        starts.sort();
        assert_eq!(
            starts,
            vec![
                Duration::ZERO,
                Duration::from_millis(100),
                Duration::from_millis(200)
            ]
        );
    }
}
