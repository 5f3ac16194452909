//! Fixed-interval polling with a timeout and cancellation support.
//!
//! Deletes that AWS rejects while a dependent resource still holds on to the
//! target (`DependencyViolation`, `InvalidIPAddress.InUse`, ...) are retried
//! here, as is waiting for a resource to reach a state.

use anyhow::Result;
use backon::{BackoffBuilder, ConstantBuilder};
use elb_stack_common::defaults::{DEFAULT_RETRY_INTERVAL_SECS, DEFAULT_RETRY_TIMEOUT_SECS};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Poll interval and overall budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl RetryPolicy {
    pub fn from_secs(interval_secs: u64, timeout_secs: u64) -> Self {
        Self {
            interval: Duration::from_secs(interval_secs),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    fn max_attempts(&self) -> usize {
        if self.interval.is_zero() {
            return 1;
        }
        let ratio = self.timeout.as_millis() / self.interval.as_millis().max(1);
        usize::try_from(ratio).unwrap_or(usize::MAX)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_secs(DEFAULT_RETRY_INTERVAL_SECS, DEFAULT_RETRY_TIMEOUT_SECS)
    }
}

/// Why a poll loop gave up
#[derive(Debug, Error)]
pub enum WaitError {
    #[error("timed out after {elapsed:?} waiting for {operation} ({attempts} attempts): {last_error}")]
    Timeout {
        operation: String,
        elapsed: Duration,
        attempts: u32,
        last_error: String,
    },

    #[error("cancelled while waiting for {operation}")]
    Cancelled { operation: String },
}

/// Run `op` until it succeeds, retrying errors accepted by `retryable`.
///
/// Other errors are returned immediately. Retryable errors are retried every
/// `policy.interval` until `policy.timeout` has elapsed, after which a
/// [`WaitError::Timeout`] is returned. Cancelling `cancel` aborts the wait.
pub async fn retry_on_error<T, F, Fut, P>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    operation: &str,
    retryable: P,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&anyhow::Error) -> bool,
{
    let retryable = &retryable;
    poll(policy, cancel, operation, || {
        let attempt = op();
        async move {
            match attempt.await {
                Ok(value) => Ok(Ok(value)),
                Err(err) if retryable(&err) => Ok(Err(format!("{err:#}"))),
                Err(err) => Err(err),
            }
        }
    })
    .await
}

/// Poll `check` until it reports `true`.
///
/// Errors from `check` are returned immediately.
pub async fn wait_until<F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    operation: &str,
    mut check: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    poll(policy, cancel, operation, || {
        let attempt = check();
        async move {
            match attempt.await {
                Ok(true) => Ok(Ok(())),
                Ok(false) => Ok(Err("not ready".to_string())),
                Err(err) => Err(err),
            }
        }
    })
    .await
}

/// Shared loop: `Ok(Err(reason))` from `attempt` means "try again"
async fn poll<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    operation: &str,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<std::result::Result<T, String>>>,
{
    let start = Instant::now();
    let mut attempts = 0u32;
    let mut delays = ConstantBuilder::default()
        .with_delay(policy.interval)
        .with_max_times(policy.max_attempts())
        .build();

    loop {
        if cancel.is_cancelled() {
            return Err(WaitError::Cancelled {
                operation: operation.to_string(),
            }
            .into());
        }

        attempts += 1;
        let reason = match attempt().await? {
            Ok(value) => {
                if attempts > 1 {
                    debug!(operation, attempts, "Retried operation succeeded");
                }
                return Ok(value);
            }
            Err(reason) => reason,
        };

        let elapsed = start.elapsed();
        let delay = match delays.next() {
            Some(delay) if elapsed < policy.timeout => delay,
            _ => {
                return Err(WaitError::Timeout {
                    operation: operation.to_string(),
                    elapsed,
                    attempts,
                    last_error: reason,
                }
                .into());
            }
        };

        warn!(
            operation,
            attempt = attempts,
            delay_ms = delay.as_millis() as u64,
            reason = %reason,
            "Operation not complete, retrying"
        );

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.cancelled() => {
                return Err(WaitError::Cancelled {
                    operation: operation.to_string(),
                }
                .into());
            }
        }
    }
}
