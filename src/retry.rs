//! Bounded retry with exponential backoff.
//!
//! The backoff schedule doubles per attempt: `base * 2^(attempt-1)` for
//! attempt 1, 2, … Sleeping goes through the [`Sleeper`] trait so tests can
//! observe the schedule without waiting on it.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

/// How a failed operation is retried.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure.
    pub max_retries: u32,
    /// Delay before the first retry; doubles each retry after that.
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Backoff before retry number `attempt` (counted from 1).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Clock abstraction for backoff and pacing delays.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by the tokio timer.
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Outcome of a retried operation that ran out of attempts.
#[derive(Debug)]
pub struct RetriesExhausted<E> {
    /// Total attempts made (initial call + retries).
    pub attempts: u32,
    /// The error from the final attempt.
    pub last_error: E,
}

/// Run `op` until it succeeds or the policy is exhausted.
///
/// The operation is invoked at most `1 + max_retries` times, with the
/// policy's backoff slept between consecutive attempts.
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    mut op: F,
) -> Result<T, RetriesExhausted<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                if attempt > policy.max_retries {
                    return Err(RetriesExhausted {
                        attempts: attempt,
                        last_error: err,
                    });
                }
                sleeper.sleep(policy.backoff(attempt)).await;
            }
        }
    }
}
