//! Bounded retry with a fixed backoff delay

use crate::Result;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts = `max_retries + 1`.
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn fixed(delay: Duration, max_retries: u32) -> Self {
        Self { max_retries, delay }
    }

    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            delay: Duration::ZERO,
        }
    }

    /// Run `operation` until it succeeds or the attempts are used up.
    /// The last error is returned unchanged.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        operation = label,
                        attempt,
                        max_retries = self.max_retries,
                        error = %e,
                        "Retrying after failure"
                    );
                    tokio::time::sleep(self.delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OrchestrationError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::fixed(Duration::from_millis(1), 2);

        let value = assert_ok!(
            policy
                .run("flaky", || async {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err(OrchestrationError::CollaboratorError("transient".into()))
                    } else {
                        Ok(n)
                    }
                })
                .await
        );

        assert_eq!(value, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::fixed(Duration::from_millis(1), 1);

        let result: Result<()> = policy
            .run("down", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(OrchestrationError::CollaboratorError("down".into()))
            })
            .await;

        assert_err!(result);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_no_retry_runs_once() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = RetryPolicy::no_retry()
            .run("once", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(OrchestrationError::CollaboratorError("nope".into()))
            })
            .await;
        assert_err!(result);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
