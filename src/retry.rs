//! Retry logic with exponential backoff
//!
//! Remote calls are wrapped in [`with_retry`] (classification through [`IsRetryable`]) or
//! [`with_retry_if`] (classification through an explicit predicate). Delays grow
//! exponentially from `initial_delay` by `backoff_multiplier`, are capped at `max_delay`,
//! and get a fresh ±`jitter` fraction applied every time one is slept.
//!
//! # Example
//!
//! ```no_run
//! use debrid_relay::retry::{IsRetryable, with_retry};
//! use debrid_relay::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{self:?}")
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::default();
//! let result = with_retry(&config, || async {
//!     // Your operation here
//!     Ok::<_, MyError>(())
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::{Error, RemoteApiError};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (no response, rate limiting, server errors) should return `true`.
/// Permanent failures (bad credentials, client errors, terminal remote verdicts) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for RemoteApiError {
    fn is_retryable(&self) -> bool {
        match self {
            // Nothing came back; the request may never have reached the service
            RemoteApiError::BadResponse(_) => true,
            // Rate limited or server-side trouble
            RemoteApiError::BadStatus { status, .. } => *status == 429 || *status >= 500,
            // The service answered but we cannot read it; asking again won't help
            RemoteApiError::Decode(_) => false,
        }
    }
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Remote(e) => e.is_retryable(),
            Error::FeedTransport(e) => e.is_timeout() || e.is_connect(),
            Error::FeedFetch { status, .. } => *status == 429 || *status >= 500,
            // Remote verdicts on a torrent are final
            Error::TorrentDownloadFailed { .. } => false,
            Error::Config { .. }
            | Error::FeedParse(_)
            | Error::Io(_)
            | Error::Serialization(_)
            | Error::Other(_) => false,
        }
    }
}

/// Backoff state for a single logical operation
///
/// Yields the un-jittered delay sequence: `initial`, then each previous delay times the
/// multiplier, capped at `max_delay`. Never shared between operations.
#[derive(Clone, Debug)]
pub struct Backoff {
    next: Duration,
    multiplier: f64,
    max_delay: Duration,
}

impl Backoff {
    /// Start a new backoff sequence from the given configuration
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            next: config.initial_delay.min(config.max_delay),
            multiplier: config.backoff_multiplier,
            max_delay: config.max_delay,
        }
    }

    /// Return the current base delay and advance to the next one
    pub fn next_delay(&mut self) -> Duration {
        let current = self.next;
        let grown = self.next.as_secs_f64() * self.multiplier;
        self.next = if grown.is_finite() {
            Duration::from_secs_f64(grown.max(0.0)).min(self.max_delay)
        } else {
            self.max_delay
        };
        current
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        Some(self.next_delay())
    }
}

/// Execute an async operation, retrying errors that classify themselves as retryable
///
/// See [`with_retry_if`] for the exact attempt accounting.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    with_retry_if(config, |e: &E| e.is_retryable(), operation).await
}

/// Execute an async operation with exponential backoff, using `is_retryable` to classify errors
///
/// The operation runs at most `config.max_attempts` times in total (a value of 0 behaves
/// like 1). A non-retryable error, or any error on the final attempt, is returned unchanged.
///
/// # Example
///
/// ```no_run
/// use debrid_relay::retry::with_retry_if;
/// use debrid_relay::config::RetryConfig;
///
/// # async fn example() -> Result<(), std::io::Error> {
/// let config = RetryConfig::default();
/// let value = with_retry_if(
///     &config,
///     |e: &std::io::Error| e.kind() == std::io::ErrorKind::TimedOut,
///     || async { Ok::<u32, std::io::Error>(7) },
/// )
/// .await?;
/// # Ok(())
/// # }
/// ```
pub async fn with_retry_if<F, Fut, T, E, P>(
    config: &RetryConfig,
    is_retryable: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let max_attempts = config.max_attempts.max(1);
    let mut backoff = Backoff::new(config);
    let mut attempt: u32 = 1;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if attempt < max_attempts && is_retryable(&e) => {
                let delay = add_jitter(backoff.next_delay(), config.jitter);

                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    remaining = max_attempts - attempt,
                    delay_ms = delay.as_millis(),
                    "Operation failed, retrying"
                );

                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if is_retryable(&e) {
                    tracing::error!(
                        error = %e,
                        attempts = attempt,
                        "Operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::debug!(
                        error = %e,
                        "Operation failed with non-retryable error"
                    );
                }
                return Err(e);
            }
        }
    }
}

/// Apply symmetric random jitter to a delay
///
/// With `fraction = 0.25` the result is uniformly distributed in `[0.75 * delay, 1.25 * delay]`,
/// never below zero.
fn add_jitter(delay: Duration, fraction: f64) -> Duration {
    if fraction <= 0.0 || delay.is_zero() {
        return delay;
    }
    let mut rng = rand::thread_rng();
    let factor: f64 = rng.gen_range(-fraction..=fraction);
    Duration::from_secs_f64((delay.as_secs_f64() * (1.0 + factor)).max(0.0))
}
