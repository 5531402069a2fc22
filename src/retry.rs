//! Retry logic for transient failures
//!
//! The default [`RetryConfig`] reproduces the classic behavior of this tool:
//! retry forever, waiting a fixed delay between attempts. A maximum attempt
//! count, exponential growth, and jitter can all be switched on through the
//! same configuration, so callers pick the strategy without touching the
//! download engine.
//!
//! # Example
//!
//! ```no_run
//! use bundle_dl::retry::{IsRetryable, download_with_retry};
//! use bundle_dl::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{:?}", self)
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
//! download_with_retry(&config, || async {
//!     Ok::<_, MyError>(())
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::{Error, FetchError};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (timeouts, connection resets, 5xx responses) return `true`.
/// Structural failures (malformed manifest, bad configuration) return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for FetchError {
    fn is_retryable(&self) -> bool {
        // Anything that is not a 404 may come back; 404 never reaches here.
        true
    }
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Fetch(e) => e.is_retryable(),
            Error::Network(e) => {
                e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
            }
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
            ),
            Error::Config { .. }
            | Error::Manifest(_)
            | Error::EmptyResultSet { .. }
            | Error::Serialization(_)
            | Error::Archive(_)
            | Error::Other(_) => false,
        }
    }
}

/// Delay schedule derived from a [`RetryConfig`]
///
/// Yields the wait before each retry, or `None` once the attempt budget is spent.
#[derive(Debug, Clone)]
pub struct Backoff {
    max_attempts: Option<u32>,
    max_delay: Duration,
    multiplier: f64,
    jitter: bool,
    retries: u32,
    delay: Duration,
}

impl Backoff {
    /// Start a fresh schedule
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            max_delay: config.max_delay,
            multiplier: config.backoff_multiplier,
            jitter: config.jitter,
            retries: 0,
            delay: config.initial_delay,
        }
    }

    /// Number of retries handed out so far
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Wait to apply before the next retry, or `None` when retries are exhausted
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.max_attempts.is_some_and(|max| self.retries >= max) {
            return None;
        }
        self.retries += 1;

        let current = self.delay;
        if self.multiplier > 1.0 {
            // a product past Duration's range saturates at the cap
            let next = Duration::try_from_secs_f64(current.as_secs_f64() * self.multiplier)
                .unwrap_or(self.max_delay);
            self.delay = next.min(self.max_delay);
        }

        Some(if self.jitter {
            add_jitter(current)
        } else {
            current
        })
    }
}

/// Outcome of a retried operation together with the number of attempts it took
#[derive(Debug)]
pub struct Attempted<T, E> {
    /// Final result
    pub result: Result<T, E>,
    /// Total attempts made, including the first
    pub attempts: u32,
}

/// Execute an async operation, retrying transient failures per `config`
///
/// Returns the successful result or the last error once the retry budget is spent.
/// With the default configuration the budget is unlimited.
pub async fn download_with_retry<F, Fut, T, E>(config: &RetryConfig, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    retry_counted(config, operation).await.result
}

/// Like [`download_with_retry`], but also reports how many attempts were made
pub async fn retry_counted<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Attempted<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut backoff = Backoff::new(config);

    loop {
        match operation().await {
            Ok(result) => {
                if backoff.retries() > 0 {
                    tracing::info!(
                        attempts = backoff.retries() + 1,
                        "Operation succeeded after retry"
                    );
                }
                return Attempted {
                    result: Ok(result),
                    attempts: backoff.retries() + 1,
                };
            }
            Err(e) if e.is_retryable() => match backoff.next_delay() {
                Some(delay) => {
                    tracing::warn!(
                        error = %e,
                        attempt = backoff.retries(),
                        max_attempts = ?config.max_attempts,
                        delay_ms = delay.as_millis(),
                        "Operation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    tracing::error!(
                        error = %e,
                        attempts = backoff.retries() + 1,
                        "Operation failed after all retry attempts exhausted"
                    );
                    return Attempted {
                        result: Err(e),
                        attempts: backoff.retries() + 1,
                    };
                }
            },
            Err(e) => {
                tracing::error!(error = %e, "Operation failed with non-retryable error");
                return Attempted {
                    result: Err(e),
                    attempts: backoff.retries() + 1,
                };
            }
        }
    }
}

/// Add random jitter to a delay to prevent thundering herd
///
/// The actual delay will be between `delay` and `2 * delay`, or exactly `delay`
/// when the jittered value does not fit in a [`Duration`].
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::try_from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor)).unwrap_or(delay)
}
