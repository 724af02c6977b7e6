//! Retry of transient transport failures.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use docsync_core::AppConfig;

/// Errors that can tell whether another attempt might succeed.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// How many extra attempts a transient failure gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { retries: 1, delay: Duration::from_millis(500) }
    }
}

impl RetryPolicy {
    pub const NONE: RetryPolicy = RetryPolicy { retries: 0, delay: Duration::ZERO };

    pub fn from_config(config: &AppConfig) -> Self {
        Self { retries: config.retries, delay: config.retry_delay() }
    }
}

/// Run `op`, retrying transient failures up to `policy.retries` times.
///
/// Non-transient failures are returned immediately.
pub async fn with_retry<T, E, F, Fut>(policy: RetryPolicy, what: &str, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Transient + Display,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.retries => {
                attempt += 1;
                tracing::warn!("{} failed: {}; retrying ({}/{})", what, err, attempt, policy.retries);
                tokio::time::sleep(policy.delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Failure(bool);

    impl Display for Failure {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "failure(transient={})", self.0)
        }
    }

    impl Transient for Failure {
        fn is_transient(&self) -> bool {
            self.0
        }
    }

    const FAST: RetryPolicy = RetryPolicy { retries: 1, delay: Duration::ZERO };

    #[tokio::test]
    async fn test_transient_failure_retried_once() {
        let calls = AtomicUsize::new(0);
        let result = with_retry(FAST, "fetch", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { if n == 0 { Err(Failure(true)) } else { Ok(n) } }
        })
        .await;
        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_retries() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), Failure> = with_retry(FAST, "fetch", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Failure(true)) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_failure_not_retried() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), Failure> = with_retry(FAST, "fetch", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Failure(false)) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_retry_policy() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), Failure> = with_retry(RetryPolicy::NONE, "fetch", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Failure(true)) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_policy_from_config() {
        let config = AppConfig { retries: 3, retry_delay_ms: 250, ..Default::default() };
        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy, RetryPolicy { retries: 3, delay: Duration::from_millis(250) });
    }
}
