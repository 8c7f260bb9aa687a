//! Exponential backoff for retryable failures.
//!
//! An attempt reports its result as an [`Outcome`]. [`run_with_backoff`] keeps
//! re-running the attempt while it reports [`Outcome::Retryable`], sleeping
//! `initial_delay * 2^(attempt - 1)` in between, and stops on success, on a
//! terminal failure, or once the attempt ceiling is reached.

use crate::{Error, ErrorDetails, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Number of retries after the first attempt used by default.
pub const DEFAULT_MAX_RETRIES: usize = 8;

/// Delay before the first retry used by default.
pub const DEFAULT_MIN_DELAY_BETWEEN_RETRIES: Duration = Duration::from_millis(500);

/// The classified result of a single attempt.
#[derive(Debug)]
pub enum Outcome<T> {
    /// The attempt succeeded.
    Success(T),
    /// The attempt failed in a way another attempt may fix.
    Retryable(Error),
    /// The attempt failed and must not be retried.
    Terminal(Error),
}

/// Exponential backoff settings for one logical call.
///
/// # Examples
///
/// ```
/// use apify_client::BackoffPolicy;
/// use std::time::Duration;
///
/// // 100ms, 200ms, 400ms between four attempts
/// let policy = BackoffPolicy {
///     initial_delay: Duration::from_millis(100),
///     max_attempts: 4,
///     jitter: false,
/// };
/// assert_eq!(policy.delay_for_attempt(3), Some(Duration::from_millis(400)));
/// assert_eq!(policy.delay_for_attempt(4), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// The delay after the first failed attempt.
    pub initial_delay: Duration,
    /// The total number of attempts, including the first one.
    pub max_attempts: usize,
    /// Whether to scale each delay by a random factor in `[0.5, 1.0]`.
    pub jitter: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_MIN_DELAY_BETWEEN_RETRIES,
            max_attempts: DEFAULT_MAX_RETRIES + 1,
            jitter: false,
        }
    }
}

impl BackoffPolicy {
    /// Returns the delay to wait after the given attempt failed, or `None` if
    /// no attempts remain.
    ///
    /// # Arguments
    ///
    /// * `attempt` - The 1-based number of the attempt that just failed
    pub fn delay_for_attempt(&self, attempt: usize) -> Option<Duration> {
        if attempt >= self.max_attempts.max(1) {
            return None;
        }

        let exponent = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        let multiplier = 2u64.saturating_pow(exponent);
        let delay = self
            .initial_delay
            .saturating_mul(multiplier.try_into().unwrap_or(u32::MAX));

        if self.jitter {
            let jitter_factor = rand::thread_rng().gen_range(0.5..=1.0);
            Some(delay.mul_f64(jitter_factor))
        } else {
            Some(delay)
        }
    }
}

fn cancelled(attempt: usize) -> Error {
    Error::Cancelled {
        attempt,
        details: Box::new(ErrorDetails {
            attempt: Some(attempt),
            ..Default::default()
        }),
    }
}

/// Runs `operation` until it succeeds, fails terminally, or runs out of attempts.
///
/// `operation` receives the 1-based attempt number. When every allowed attempt
/// is retryable the last failure is returned wrapped in
/// [`Error::MaxRetriesExceeded`]. If `cancel` fires while an attempt is in
/// flight or during a backoff sleep, the call ends with [`Error::Cancelled`].
pub async fn run_with_backoff<T, F, Fut>(
    policy: &BackoffPolicy,
    cancel: Option<&CancellationToken>,
    mut operation: F,
) -> Result<T>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Outcome<T>>,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        let outcome = match cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(cancelled(attempt)),
                    outcome = operation(attempt) => outcome,
                }
            }
            None => operation(attempt).await,
        };

        let error = match outcome {
            Outcome::Success(value) => return Ok(value),
            Outcome::Terminal(error) => return Err(error),
            Outcome::Retryable(error) => error,
        };

        let Some(delay) = policy.delay_for_attempt(attempt) else {
            tracing::warn!(
                error = %error,
                attempts = attempt,
                "Giving up after exhausting retries"
            );
            return Err(Error::MaxRetriesExceeded {
                attempts: attempt,
                last_error: Box::new(error),
            });
        };

        tracing::info!(
            error = %error,
            delay_ms = delay.as_millis(),
            attempt = attempt,
            "Retrying request after delay"
        );

        match cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        return Err(cancelled(attempt + 1));
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            None => tokio::time::sleep(delay).await,
        }
    }
}
