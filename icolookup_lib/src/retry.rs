//! Retry with exponential backoff for registry requests.
//!
//! Each search runs through a small state machine:
//! `Attempting -> Waiting -> Attempting -> ... -> Success | Exhausted | Rejected`.
//! Every attempt first takes a rate-limiter permit; backoff sleeps suspend only
//! the retrying worker.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;

use crate::cancel::CancelFlag;
use crate::error::RegistryError;
use crate::rate_limiter::RateLimiter;

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts including the first; at least 1.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles for each further retry.
    pub base_delay: Duration,
    /// Upper bound of the uniform random delay added to every backoff.
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_jitter: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `retry` (1-based), without jitter:
    /// `base`, `2 * base`, `4 * base`, ...
    pub fn backoff(&self, retry: u32) -> Duration {
        let shift = retry.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << shift)
    }

    fn jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }
}

/// A successful value plus how many retries it took.
#[derive(Debug, Clone, PartialEq)]
pub struct Retried<T> {
    pub value: T,
    pub retries: u32,
}

enum RetryState {
    Attempting { attempt: u32 },
    Waiting { attempt: u32, delay: Duration },
}

/// Runs `operation` under the rate limiter, retrying transient failures.
///
/// - Calls `rate_limiter.acquire()` before each attempt.
/// - Transient errors (see [`rpo_api::Error::is_transient`]) are retried up
///   to `policy.max_attempts` attempts in total.
/// - Permanent errors return immediately.
/// - The cancel flag is checked before every attempt.
/// - Records all outcomes on the limiter's tracker.
pub async fn with_retry<T, F, Fut>(
    rate_limiter: &RateLimiter,
    policy: &RetryPolicy,
    cancel: &CancelFlag,
    label: &str,
    mut operation: F,
) -> Result<Retried<T>, RegistryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, rpo_api::Error>>,
{
    let tracker = rate_limiter.tracker();
    let max_attempts = policy.max_attempts.max(1);
    let mut state = RetryState::Attempting { attempt: 1 };

    loop {
        state = match state {
            RetryState::Attempting { attempt } => {
                if cancel.is_cancelled() {
                    return Err(RegistryError::Cancelled {
                        attempts: attempt - 1,
                    });
                }
                rate_limiter.acquire().await;

                match operation().await {
                    Ok(value) => {
                        tracker.record_success();
                        return Ok(Retried {
                            value,
                            retries: attempt - 1,
                        });
                    }
                    Err(err) if !err.is_transient() => {
                        tracker.record_failure();
                        tracing::error!("{}: permanent failure: {}", label, err);
                        return Err(RegistryError::Permanent {
                            attempts: attempt,
                            message: err.to_string(),
                        });
                    }
                    Err(err) if attempt >= max_attempts => {
                        tracker.record_failure();
                        tracing::warn!("{}: giving up after {} attempts: {}", label, attempt, err);
                        return Err(RegistryError::Exhausted {
                            attempts: attempt,
                            last: err.to_string(),
                        });
                    }
                    Err(err) => {
                        tracker.record_failure();
                        let delay = policy.backoff(attempt) + policy.jitter();
                        tracing::warn!(
                            "{}: attempt {}/{} failed ({}), retrying in {:.1}s",
                            label,
                            attempt,
                            max_attempts,
                            err,
                            delay.as_secs_f64()
                        );
                        RetryState::Waiting { attempt, delay }
                    }
                }
            }
            RetryState::Waiting { attempt, delay } => {
                tracker.record_backoff(delay);
                sleep(delay).await;
                RetryState::Attempting {
                    attempt: attempt + 1,
                }
            }
        };
    }
}
