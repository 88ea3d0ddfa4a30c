//! Fixed-interval retry for cloud API calls
//!
//! Every remote call runs inside `retry`: transient failures (throttling,
//! transport hiccups, eventually-consistent lookups) are re-attempted at a
//! fixed interval until a time budget is spent; permanent failures abort the
//! loop on the first attempt. The call site decides which is which.

use std::time::{Duration, Instant};

use crate::provider::ProviderError;

/// Budget for read-style calls (describe, list)
pub const READ_RETRY_TIMEOUT: Duration = Duration::from_secs(180);
/// Budget for write-style calls (create, modify, delete)
pub const WRITE_RETRY_TIMEOUT: Duration = Duration::from_secs(300);
/// Pause between attempts
pub const RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Classified failure of a single attempt
#[derive(Debug)]
pub enum RetryError {
    /// Worth another attempt (network failure, throttling, propagation delay)
    Transient(ProviderError),
    /// Retrying cannot help (bad parameters, permissions, typed API refusal)
    Permanent(ProviderError),
}

impl RetryError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(ProviderError::new(message))
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent(ProviderError::new(message))
    }
}

/// Attempt budget and pacing for one retried call
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub interval: Duration,
}

impl RetryPolicy {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    /// Policy for read-style calls
    pub fn read() -> Self {
        Self::new(READ_RETRY_TIMEOUT, RETRY_INTERVAL)
    }

    /// Policy for write-style calls
    pub fn write() -> Self {
        Self::new(WRITE_RETRY_TIMEOUT, RETRY_INTERVAL)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Run `op` until it succeeds, fails permanently, or the budget is spent.
///
/// When the budget runs out the last transient error is returned, annotated
/// with the elapsed budget so the user sees both what kept failing and for
/// how long it was retried.
pub async fn retry<T, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RetryError>>,
{
    let deadline = Instant::now() + policy.timeout;

    loop {
        let last = match op().await {
            Ok(value) => return Ok(value),
            Err(RetryError::Permanent(err)) => return Err(err),
            Err(RetryError::Transient(err)) => err,
        };

        if Instant::now() + policy.interval > deadline {
            return Err(ProviderError::new(format!(
                "still failing after {}s: {}",
                policy.timeout.as_secs(),
                last
            )));
        }
        tokio::time::sleep(policy.interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn quick() -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(50), Duration::from_millis(1))
    }

    #[tokio::test]
    async fn returns_first_success() {
        let attempts = AtomicUsize::new(0);

        let result = retry(quick(), || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(RetryError::transient("throttled"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_error_stops_immediately() {
        let attempts = AtomicUsize::new(0);

        let result: Result<(), _> = retry(quick(), || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(RetryError::permanent("InvalidParameterValue")) }
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.message, "InvalidParameterValue");
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn budget_exhaustion_reports_last_error() {
        let result: Result<(), _> = retry(quick(), || async {
            Err(RetryError::transient("connection reset"))
        })
        .await;

        let err = result.unwrap_err();
        assert!(err.message.contains("still failing"));
        assert!(err.message.contains("connection reset"));
    }
}
