//! Per-attempt deadlines.
//!
//! Each network attempt gets its own deadline. Expiry drops (and so cancels)
//! only that attempt; the caller treats it as a network error.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("attempt timed out after {} ms", .0.as_millis())]
pub struct AttemptTimeout(pub Duration);

/// Run `fut` with a hard deadline.
pub async fn with_deadline<F, T>(deadline: Duration, fut: F) -> Result<T, AttemptTimeout>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(deadline, fut)
        .await
        .map_err(|_| AttemptTimeout(deadline))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expires() {
        let result = with_deadline(Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            1
        })
        .await;
        assert_eq!(result, Err(AttemptTimeout(Duration::from_millis(50))));
        assert_eq!(
            AttemptTimeout(Duration::from_millis(50)).to_string(),
            "attempt timed out after 50 ms"
        );
    }

    #[tokio::test]
    async fn test_completes_in_time() {
        assert_eq!(with_deadline(Duration::from_secs(1), async { 7 }).await, Ok(7));
    }
}
