//! Retry policy for transient collaborator failures.
//!
//! Only errors for which [`Error::is_retryable`] holds are retried; schema and
//! configuration errors surface immediately.

use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use nixdex_core::{Error, Result};

/// Exponential backoff settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: usize,
    /// Delay before the first retry.
    pub min_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries)
            .with_jitter()
    }

    /// Run `operation`, retrying transient failures with exponential backoff.
    ///
    /// `what` names the operation in the log line emitted before each retry.
    pub async fn run<T, F, Fut>(&self, what: &str, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        operation
            .retry(self.backoff())
            .when(Error::is_retryable)
            .notify(|err: &Error, delay: Duration| {
                log::warn!("{what}: {err}; retrying in {delay:?}");
            })
            .await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast(max_retries: usize) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            min_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    #[tokio::test]
    async fn test_retries_transient_errors_until_success() {
        let attempts = AtomicUsize::new(0);
        let counter = &attempts;
        let result = fast(3)
            .run("flaky", || async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(Error::http("connection reset", None))
                } else {
                    Ok(7)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let attempts = AtomicUsize::new(0);
        let counter = &attempts;
        let result: Result<()> = fast(2)
            .run("down", || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(Error::http("service unavailable", Some(503)))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_does_not_retry_permanent_errors() {
        let attempts = AtomicUsize::new(0);
        let counter = &attempts;
        let result: Result<()> = fast(5)
            .run("missing", || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(Error::http("not found", Some(404)))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_none_policy() {
        assert_eq!(RetryPolicy::none().max_retries, 0);
    }
}
