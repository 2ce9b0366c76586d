//! Retry logic for remote embedding providers
//!
//! Exponential backoff with jitter for transient failures.

use std::time::Duration;

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: usize,
    /// Initial delay before first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Add up to 25% jitter to each delay
    pub add_jitter: bool,
    /// Retryable HTTP status codes
    pub retryable_status_codes: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            add_jitter: true,
            retryable_status_codes: vec![
                429, // Too Many Requests
                500, // Internal Server Error
                502, // Bad Gateway
                503, // Service Unavailable
                504, // Gateway Timeout
            ],
        }
    }
}

impl RetryConfig {
    /// Create a config with no retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Builder: set max attempts
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Builder: set initial delay
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Builder: set max delay
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Builder: enable/disable jitter
    pub fn with_jitter(mut self, add_jitter: bool) -> Self {
        self.add_jitter = add_jitter;
        self
    }

    /// Delay before retry number `attempt` (0-indexed)
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let base = self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        let clamped = base.min(self.max_delay.as_millis() as f64);

        let delay = if self.add_jitter {
            clamped + clamped * 0.25 * rand_jitter()
        } else {
            clamped
        };

        Duration::from_millis(delay as u64)
    }

    /// Check if a status code is retryable
    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_status_codes.contains(&status)
    }
}

/// Pseudo-random jitter in [0, 1)
fn rand_jitter() -> f64 {
    use std::sync::atomic::{AtomicU64, Ordering};
    static SEED: AtomicU64 = AtomicU64::new(0);

    // LCG parameters
    const A: u64 = 1103515245;
    const C: u64 = 12345;
    const M: u64 = 1 << 31;

    let seed = SEED.fetch_add(1, Ordering::Relaxed);
    let time_component = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);

    let next = (A.wrapping_mul(seed.wrapping_add(time_component)).wrapping_add(C)) % M;
    (next as f64) / (M as f64)
}

/// Outcome of one attempt, as judged by the caller
#[derive(Debug)]
pub enum Attempt<T, E> {
    /// Finished, successfully or not; do not retry
    Done(Result<T, E>),
    /// Failed transiently; retry if attempts remain
    Transient(E),
}

/// Execute an async operation, retrying transient failures with backoff.
///
/// The final error is returned once `max_attempts` is exhausted.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, operation: F) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Attempt<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Attempt::Done(result) => return result,
            Attempt::Transient(e) => {
                attempt += 1;
                if attempt >= config.max_attempts {
                    return Err(e);
                }

                let delay = config.delay_for_attempt(attempt - 1);
                tracing::debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retrying transient embedding failure"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
