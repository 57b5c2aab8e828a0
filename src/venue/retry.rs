//! Bounded retry with jittered exponential backoff.

use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::warn;

use crate::error::VenueError;

/// Retry schedule for transient venue failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Ceiling on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based), doubled each attempt
    /// with up to 25% jitter added.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let base = self.base_delay.saturating_mul(1u32 << exp);
        let capped = base.min(self.max_delay);
        capped + jitter(capped / 4)
    }
}

/// Deterministic-free jitter in `[0, max)` derived from the clock's subsecond
/// nanos. Avoids pulling in an RNG for a scheduling concern.
fn jitter(max: Duration) -> Duration {
    if max.is_zero() {
        return Duration::ZERO;
    }
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0);
    Duration::from_nanos(nanos % max.as_nanos() as u64)
}

/// Run `operation` until it succeeds, a non-transient error occurs, or the
/// policy is exhausted.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T, VenueError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, VenueError>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                warn!(
                    operation = operation_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient venue error, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delay_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
        };

        // Jitter adds at most 25%, so bounds are loose on the high side.
        let first = policy.delay_for(1);
        assert!(first >= Duration::from_millis(100));
        assert!(first <= Duration::from_millis(125));

        let third = policy.delay_for(3);
        assert!(third >= Duration::from_millis(300));
        assert!(third <= Duration::from_millis(375));
    }

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        };
        let calls = AtomicU32::new(0);

        let result = with_retry(&policy, "fetch", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(VenueError::Network("connection reset".to_string()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_transient_errors_fail_fast() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = with_retry(&policy, "place", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(VenueError::Rejected {
                    reason: "insufficient margin".to_string(),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(VenueError::Rejected { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_policy_returns_last_error() {
        let policy = RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
        };
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = with_retry(&policy, "fetch", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(VenueError::RateLimited {
                    retry_after_seconds: 1,
                })
            }
        })
        .await;

        assert!(matches!(result, Err(VenueError::RateLimited { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
