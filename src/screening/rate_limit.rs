// =============================================================================
// Upstream call pacing + transient-failure retry
// =============================================================================
//
// The real-time path calls the price provider once per stock. Calls are spaced
// at least `min_interval` apart, and transient failures (network, timeout) are
// retried with exponential backoff: base, 2*base, 4*base, ...
// Terminal failures (not found, malformed) return immediately.
// =============================================================================

use std::future::Future;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::ProviderError;
use crate::types::StockId;

/// Enforces a minimum gap between consecutive upstream calls.
#[derive(Debug)]
pub struct MinIntervalLimiter {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl MinIntervalLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Waits until a call is allowed, then claims the slot.
    pub async fn acquire(&self) {
        let mut last = self.last_call.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                debug!(wait_ms = wait.as_millis() as u64, "pacing upstream call");
                tokio::time::sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Backoff before retry number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Runs `op`, retrying retryable errors up to `policy.max_retries` times.
pub async fn with_retries<T, F, Fut>(
    policy: &RetryPolicy,
    stock_id: &StockId,
    mut op: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt);
                warn!(
                    stock = %stock_id,
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "transient provider failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn backoff_doubles() {
        let p = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
        };
        assert_eq!(p.delay_for(0), Duration::from_millis(1000));
        assert_eq!(p.delay_for(1), Duration::from_millis(2000));
        assert_eq!(p.delay_for(2), Duration::from_millis(4000));
    }

    #[tokio::test]
    async fn transient_errors_are_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let id = StockId::new("A");
        let out = with_retries(&policy(3), &id, move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(ProviderError::Timeout)
            } else {
                Ok(n)
            }
        })
        .await;
        assert_eq!(out, Ok(2));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let id = StockId::new("A");
        let out: Result<(), _> = with_retries(&policy(2), &id, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::Transient("reset".into()))
        })
        .await;
        assert!(matches!(out, Err(ProviderError::Transient(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn terminal_errors_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let id = StockId::new("A");
        let out: Result<(), _> = with_retries(&policy(3), &id, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::NotFound("A".into()))
        })
        .await;
        assert!(out.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn limiter_spaces_calls() {
        let limiter = MinIntervalLimiter::new(Duration::from_millis(20));
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(40));
    }
}
