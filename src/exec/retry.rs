// src/exec/retry.rs

//! Deadline-bounded, fixed-interval retry for opening the session.
//!
//! Hosts that were just created are usually still booting, so connection
//! failures are retried at a fixed pace until an absolute deadline instead of
//! backing off exponentially.

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep, sleep_until};
use tracing::{info, warn};

use super::transport::Communicator;
use crate::config::validate::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_RETRY_INTERVAL};
use crate::errors::ConnectError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Give up once this much time has passed since the first attempt.
    pub timeout: Duration,
    /// Pause between a failed attempt and the next one.
    pub interval: Duration,
}

impl RetryPolicy {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT, DEFAULT_RETRY_INTERVAL)
    }
}

/// Call `op` until it succeeds or `policy.timeout` has elapsed.
///
/// After each failure the error is logged as retryable and the loop waits for
/// `policy.interval` or the deadline, whichever comes first. Reaching the
/// deadline returns the last error; no attempt is started after it.
pub async fn retry_until_deadline<F, Fut, T>(
    policy: RetryPolicy,
    mut op: F,
) -> Result<T, ConnectError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let started = Instant::now();
    // A timeout too large to represent as an instant never expires.
    let deadline = started.checked_add(policy.timeout);
    let mut attempts: u32 = 0;

    loop {
        attempts = attempts.saturating_add(1);
        let err = match op().await {
            Ok(value) => {
                if attempts > 1 {
                    info!(attempts, "succeeded after retrying");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        warn!(attempt = attempts, error = %format!("{err:#}"), "retryable error");

        let expired = async {
            match deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = expired => {
                return Err(ConnectError {
                    attempts,
                    elapsed: started.elapsed(),
                    source: err,
                });
            }
            _ = sleep(policy.interval) => {}
        }
    }
}

/// Open the session behind `comm`, retrying per `policy`.
pub async fn connect_with_retry<C>(comm: &C, policy: RetryPolicy) -> Result<(), ConnectError>
where
    C: Communicator + ?Sized,
{
    info!(
        timeout = ?policy.timeout,
        interval = ?policy.interval,
        "connecting to remote host"
    );
    retry_until_deadline(policy, || comm.connect()).await
}
