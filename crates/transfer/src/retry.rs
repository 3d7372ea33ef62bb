//! Bounded retry with fixed or capped exponential delay.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// How often and how patiently a transient failure is retried.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Additional attempts after the first one.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub delay: Duration,
    /// Multiplier applied per subsequent retry (1.0 = fixed delay).
    pub backoff_factor: f64,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            delay: Duration::from_secs(4),
            backoff_factor: 1.0,
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Policy with a fixed delay between attempts.
    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            delay,
            backoff_factor: 1.0,
            max_delay: delay,
        }
    }

    /// Policy that never retries.
    pub fn none() -> Self {
        Self::fixed(0, Duration::ZERO)
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(63) as i32;
        let factor = self.backoff_factor.max(1.0);
        let secs = self.delay.as_secs_f64() * factor.powi(exp);
        let cap = self.max_delay.max(self.delay).as_secs_f64();
        Duration::from_secs_f64(secs.min(cap))
    }
}

/// Runs `op` until it succeeds, fails with a non-transient error, or the
/// policy's retry budget is spent.
///
/// `op` receives the 1-based attempt number. Errors for which `is_transient`
/// returns `false` are returned immediately. After `max_retries` retries the
/// last error is returned unchanged.
pub async fn retry<T, E, F, Fut, C>(
    policy: &RetryPolicy,
    operation: &str,
    is_transient: C,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> bool,
    E: Display,
{
    let mut attempt: u32 = 0;
    loop {
        attempt = attempt.saturating_add(1);
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt <= policy.max_retries && is_transient(&e) => {
                let delay = policy.delay_for_retry(attempt);
                warn!(
                    operation,
                    retry = attempt,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
