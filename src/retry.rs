//! Retry with backoff for connection attempts
//!
//! Only transient failures are retried (see [`ConnectError::is_transient`]).
//! The default policy used by [`crate::Connector`] makes a single attempt.

use crate::errors::ConnectError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,

    /// Initial delay before first retry
    pub initial_delay: Duration,

    /// Maximum delay between retries
    pub max_delay: Duration,

    /// Backoff strategy to use
    pub backoff_strategy: BackoffStrategy,

    /// Whether to add jitter to delays
    pub jitter: bool,

    /// Predicate to determine if error is retryable
    pub retry_condition: fn(&ConnectError) -> bool,
}

/// Backoff strategies for retry delays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed,

    /// Linear increase in delay
    Linear,

    /// Exponential backoff (delay doubles each time)
    #[default]
    Exponential,

    /// Fibonacci sequence backoff
    Fibonacci,
}

/// Outcome details of a failed retry loop
#[derive(Debug)]
pub struct RetryFailure {
    /// The error from the last attempt
    pub last_error: ConnectError,
    /// Attempts actually made
    pub attempts: u32,
    /// Wall time spent across all attempts
    pub total_duration: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_strategy: BackoffStrategy::Exponential,
            jitter: true,
            retry_condition: default_retry_condition,
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy with default settings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy that makes exactly one attempt
    #[must_use]
    pub fn none() -> Self {
        Self::default().with_max_attempts(1).with_jitter(false)
    }

    /// Set maximum number of attempts (at least one is always made)
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set initial delay
    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set maximum delay
    #[must_use]
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set backoff strategy
    #[must_use]
    pub const fn with_backoff_strategy(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff_strategy = strategy;
        self
    }

    /// Enable or disable jitter
    #[must_use]
    pub const fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Set custom retry condition
    #[must_use]
    pub fn with_retry_condition(mut self, condition: fn(&ConnectError) -> bool) -> Self {
        self.retry_condition = condition;
        self
    }

    /// Run `operation` until it succeeds, fails permanently, or attempts run out
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> Result<T, RetryFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ConnectError>>,
    {
        let start_time = Instant::now();
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            debug!("Connection attempt {}/{}", attempt, max_attempts);

            let error = match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        info!(
                            "Connected on attempt {} after {:?}",
                            attempt,
                            start_time.elapsed()
                        );
                    }
                    return Ok(result);
                }
                Err(error) => error,
            };

            let retryable = (self.retry_condition)(&error);
            if !retryable || attempt >= max_attempts {
                if retryable {
                    warn!("Giving up after attempt {}: {}", attempt, error);
                } else {
                    debug!("Not retrying non-transient error: {}", error);
                }
                return Err(RetryFailure {
                    last_error: error,
                    attempts: attempt,
                    total_duration: start_time.elapsed(),
                });
            }

            let delay = self.calculate_delay(attempt);
            warn!(
                "Attempt {} failed, retrying in {:?}: {}",
                attempt, delay, error
            );
            sleep(delay).await;
            attempt += 1;
        }
    }

    /// Delay to wait after the given (1-based) failed attempt
    #[must_use]
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_delay = match self.backoff_strategy {
            BackoffStrategy::Fixed => self.initial_delay,
            BackoffStrategy::Linear => self.initial_delay.saturating_mul(attempt),
            BackoffStrategy::Exponential => {
                let multiplier = 2_u32.saturating_pow(attempt.saturating_sub(1));
                self.initial_delay.saturating_mul(multiplier)
            }
            BackoffStrategy::Fibonacci => self.initial_delay.saturating_mul(fibonacci(attempt)),
        };

        let mut delay = base_delay.min(self.max_delay);

        if self.jitter {
            #[allow(clippy::cast_precision_loss)]
            let jitter_amount = delay.as_millis() as f64 * 0.1; // 10% jitter
            let jitter = (fastrand::f64() * jitter_amount).mul_add(2.0, -jitter_amount);
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let jitter_duration = Duration::from_millis(jitter.abs() as u64);

            if jitter >= 0.0 {
                delay += jitter_duration;
            } else {
                delay = delay.saturating_sub(jitter_duration);
            }
        }

        delay
    }
}

/// Default retry condition - retry if error is transient
fn default_retry_condition(error: &ConnectError) -> bool {
    error.is_transient()
}

/// Calculate fibonacci number (used for fibonacci backoff)
fn fibonacci(n: u32) -> u32 {
    if n <= 1 {
        n
    } else {
        let mut a: u32 = 0;
        let mut b: u32 = 1;
        for _ in 2..=n {
            let temp = a.saturating_add(b);
            a = b;
            b = temp;
        }
        b
    }
}
