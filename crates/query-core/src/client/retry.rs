//! Throttle and retry-with-backoff
//!
//! Every outbound client owns one [`Throttle`] (minimum spacing between its
//! requests) and runs each request through [`retry_with_backoff`].

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Retry/throttle tunables for one outbound client
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Minimum spacing between requests
    pub throttle: Duration,

    /// Wait before the first retry
    pub initial_backoff: Duration,

    /// Retries allowed after the first attempt
    pub max_retries: u32,

    /// Factor applied to the wait after each retry
    pub backoff_multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            throttle: Duration::from_millis(1000),
            initial_backoff: Duration::from_millis(1000),
            max_retries: 3,
            backoff_multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Policy without throttling or retries
    pub const fn none() -> Self {
        Self {
            throttle: Duration::ZERO,
            initial_backoff: Duration::ZERO,
            max_retries: 0,
            backoff_multiplier: 1,
        }
    }

    /// Read `MAX_RETRIES`, `RETRY_BACKOFF_MS`, `RETRY_BACKOFF_MULTIPLIER` and
    /// the named throttle variable (milliseconds). Unset or unparsable values
    /// keep their defaults.
    pub fn from_env(throttle_var: &str, default_throttle_ms: u64) -> Self {
        fn parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
            std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
        }

        let defaults = Self::default();
        Self {
            throttle: Duration::from_millis(parsed(throttle_var).unwrap_or(default_throttle_ms)),
            initial_backoff: parsed("RETRY_BACKOFF_MS")
                .map_or(defaults.initial_backoff, Duration::from_millis),
            max_retries: parsed("MAX_RETRIES").unwrap_or(defaults.max_retries),
            backoff_multiplier: parsed("RETRY_BACKOFF_MULTIPLIER")
                .unwrap_or(defaults.backoff_multiplier)
                .max(1),
        }
    }

    /// Wait before the `retry`-th retry (1-based):
    /// `initial_backoff * multiplier^(retry-1)`
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1);
        let factor = self.backoff_multiplier.saturating_pow(exponent);
        self.initial_backoff.saturating_mul(factor)
    }
}

/// Per-request retry bookkeeping; never shared between requests
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RetryState {
    pub attempt: u32,
    pub wait: Duration,
}

/// Minimum-interval gate for one client instance.
///
/// Callers sharing a client queue on the gate, so concurrent use adds latency
/// rather than bursts.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until at least `interval` has passed since the previous request
    pub async fn acquire(&self) {
        let mut last = self.last.lock().await;
        if let Some(previous) = *last {
            tokio::time::sleep_until(previous + self.interval).await;
        }
        *last = Some(Instant::now());
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the retry
/// budget is spent. The last error is returned unchanged.
pub async fn retry_with_backoff<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    is_retryable: P,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut(RetryState) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut state = RetryState::default();

    loop {
        match op(state).await {
            Ok(value) => return Ok(value),
            Err(err) if is_retryable(&err) && state.attempt < policy.max_retries => {
                state.attempt += 1;
                state.wait = policy.backoff(state.attempt);
                tracing::warn!(
                    attempt = state.attempt,
                    max_retries = policy.max_retries,
                    wait_ms = u64::try_from(state.wait.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "Throttled; backing off"
                );
                tokio::time::sleep(state.wait).await;
            }
            Err(err) => return Err(err),
        }
    }
}
