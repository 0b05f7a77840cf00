//! Retry with exponential backoff
//!
//! Used for operations that are safe to repeat: blob writes (the key is
//! fixed before the first attempt), classification calls, and SQLite
//! statements that hit "database is locked".
//!
//! **Algorithm:**
//! 1. Attempt operation
//! 2. If successful, return result
//! 3. If the error is retryable and attempts remain: log WARN, back off, retry
//! 4. Otherwise return the error (ERROR log if retries were exhausted)
//!
//! Backoff starts at `initial_backoff`, doubles per attempt, capped at
//! `max_backoff`.

use std::fmt::Display;
use std::future::Future;
use std::time::{Duration, Instant};

/// Bounded retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_backoff_ms: u64) -> Self {
        Self {
            max_retries,
            initial_backoff: Duration::from_millis(initial_backoff_ms),
            max_backoff: Duration::from_millis(2000),
        }
    }

    /// Single attempt, no retries
    pub fn none() -> Self {
        Self::new(0, 0)
    }

    /// Delay before retry number `retry` (1-based)
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, 100)
    }
}

/// Run `operation`, retrying errors for which `is_retryable` returns true
///
/// # Arguments
/// * `operation_name` - Name for logging (e.g., "blob write", "classification")
/// * `policy` - Retry count and backoff
/// * `is_retryable` - Classifies an error as transient
/// * `operation` - Async closure performing one attempt
pub async fn retry_with_backoff<F, Fut, T, E, R>(
    operation_name: &str,
    policy: RetryPolicy,
    is_retryable: R,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: Display,
{
    let start_time = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                if !is_retryable(&err) {
                    return Err(err);
                }

                let retries_done = attempt - 1;
                if retries_done >= policy.max_retries {
                    if policy.max_retries > 0 {
                        tracing::error!(
                            operation = operation_name,
                            attempt,
                            elapsed_ms = start_time.elapsed().as_millis() as u64,
                            error = %err,
                            "Operation failed: retries exhausted"
                        );
                    }
                    return Err(err);
                }

                let backoff = policy.backoff_for(attempt);
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "Transient failure, will retry after backoff"
                );

                tokio::time::sleep(backoff).await;
            }
        }
    }
}
