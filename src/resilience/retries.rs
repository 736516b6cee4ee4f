//! Retry logic.
//!
//! # Responsibilities
//! - Execute an async operation with exponential backoff + jitter
//! - Report each scheduled retry to the caller before sleeping
//!
//! # Design Decisions
//! - Exhausting retries returns the last error unchanged
//! - Jittered backoff prevents thundering herd

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

use crate::resilience::backoff::BackoffPolicy;

/// How many times to retry and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub backoff: BackoffPolicy,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: BackoffPolicy) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }
}

/// Run `op` until it succeeds or `policy.max_retries` retries have failed.
///
/// `on_retry(attempt, delay, &error)` runs before each backoff sleep, with
/// `attempt` being the 0-based index of the attempt that just failed.
pub async fn retry_with_backoff<T, E, F, Fut, R>(
    policy: &RetryPolicy,
    mut op: F,
    mut on_retry: R,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: FnMut(u32, Duration, &E),
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= policy.max_retries => return Err(e),
            Err(e) => {
                let delay = policy.backoff.delay(attempt);
                on_retry(attempt, delay, &e);
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
