//! Retry with backoff — the one place the pipeline waits on failure.
//!
//! `retry_with_backoff` is parameterised by attempt ceiling, base delay,
//! schedule and a retryability predicate. Every wait is bounded by the policy.

use std::fmt::Display;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

/// Growth of the delay between successive attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// base × n
    Linear,
    /// base × 2^(n-1)
    Exponential,
}

impl FromStr for Backoff {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" => Ok(Backoff::Linear),
            "exponential" => Ok(Backoff::Exponential),
            other => Err(format!(
                "unknown backoff '{other}' (expected 'linear' or 'exponential')"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            backoff: Backoff::Exponential,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the `failed_attempts`-th consecutive failure.
    pub fn delay_after(&self, failed_attempts: u32) -> Duration {
        let n = failed_attempts.max(1);
        match self.backoff {
            Backoff::Linear => self.base_delay.saturating_mul(n),
            Backoff::Exponential => {
                let exponent = (n - 1).min(16);
                self.base_delay.saturating_mul(1u32 << exponent)
            }
        }
    }
}

/// The operation did not succeed. `attempts` counts calls actually made.
#[derive(Debug)]
pub struct RetryError<E> {
    pub attempts: u32,
    pub error: E,
}

/// Runs `op` until it succeeds, returns a non-retryable error, or
/// `policy.max_attempts` calls have been made. `op` receives the 1-based
/// attempt number.
pub async fn retry_with_backoff<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    is_retryable: P,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        let error = match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        if !is_retryable(&error) || attempt >= max_attempts {
            return Err(RetryError {
                attempts: attempt,
                error,
            });
        }

        let delay = policy.delay_after(attempt);
        warn!(
            "Attempt {}/{} failed: {}; retrying after {}ms",
            attempt,
            max_attempts,
            error,
            delay.as_millis()
        );
        tokio::time::sleep(delay).await;
    }
}
