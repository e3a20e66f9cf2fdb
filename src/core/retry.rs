//! Bounded retry for optimistic transactions.
//!
//! A transactional operation that loses a race fails with
//! [`Error::TransactionConflict`]. The policy re-runs the whole operation (fresh read,
//! fresh computation, fresh commit) a small number of times before handing the conflict to
//! the caller. No other error kind is retried.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// `[retry]` section of the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay between attempts; attempt `n` waits `n * backoff_ms`
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_backoff_ms() -> u64 {
    10
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            backoff_ms: 0,
        }
    }

    /// Runs `attempt` until it succeeds, fails with a non-retryable error, or the attempt
    /// budget is spent.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut tries = 0;
        loop {
            tries += 1;
            match attempt().await {
                Err(err) if err.is_retryable() && tries < max_attempts => {
                    warn!(
                        operation,
                        attempt = tries,
                        max_attempts,
                        error = %err,
                        "Transaction conflict, retrying"
                    );
                    if self.backoff_ms > 0 {
                        let delay = self.backoff_ms.saturating_mul(u64::from(tries));
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                    }
                }
                Err(err @ Error::TransactionConflict { .. }) => {
                    warn!(operation, attempts = tries, "Giving up after conflicts");
                    return Err(err);
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn conflict() -> Error {
        Error::TransactionConflict {
            resource: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_conflicts() {
        let calls = Cell::new(0);
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff_ms: 0,
        };

        let result = policy
            .run("test", || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move { if n < 3 { Err(conflict()) } else { Ok(n) } }
            })
            .await;

        assert!(matches!(result, Ok(3)));
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = Cell::new(0);
        let policy = RetryPolicy {
            max_attempts: 2,
            backoff_ms: 1,
        };

        let result: Result<()> = policy
            .run("test", || {
                calls.set(calls.get() + 1);
                async { Err(conflict()) }
            })
            .await;

        assert!(matches!(result, Err(Error::TransactionConflict { .. })));
        assert_eq!(calls.get(), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_errors_fail_fast() {
        let calls = Cell::new(0);

        let result: Result<()> = RetryPolicy::default()
            .run("test", || {
                calls.set(calls.get() + 1);
                async {
                    Err(Error::StorageUnavailable {
                        message: "down".to_string(),
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(Error::StorageUnavailable { .. })));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn test_no_retry_policy() {
        let calls = Cell::new(0);

        let result: Result<()> = RetryPolicy::no_retry()
            .run("test", || {
                calls.set(calls.get() + 1);
                async { Err(conflict()) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }
}
