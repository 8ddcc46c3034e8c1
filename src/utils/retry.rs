//! Bounded exponential backoff with jitter for calls to the embedding and completion services.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::models::RetrySettings;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, the first call included.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Attempt timed-out calls again.
    pub retry_timeouts: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig::from(&RetrySettings::default())
    }
}

impl RetryConfig {
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    #[must_use]
    pub fn with_retry_timeouts(mut self, retry_timeouts: bool) -> Self {
        self.retry_timeouts = retry_timeouts;
        self
    }

    /// Delay before attempt `attempt + 1`, doubling from `initial_delay` and
    /// capped at `max_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// [`backoff`](Self::backoff) plus up to a quarter of it at random.
    pub fn jittered_backoff(&self, attempt: u32) -> Duration {
        let base = self.backoff(attempt);
        let spread = base.as_millis() as u64 / 4;
        if spread == 0 {
            return base;
        }
        base + Duration::from_millis(rand::thread_rng().gen_range(0..=spread))
    }

    fn should_retry<E: Retryable>(&self, error: &E) -> bool {
        if error.is_timeout() {
            self.retry_timeouts
        } else {
            error.is_retryable()
        }
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            initial_delay: Duration::from_millis(settings.initial_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            retry_timeouts: settings.retry_timeouts,
        }
    }
}

/// Classifies upstream failures for [`with_retry`].
pub trait Retryable {
    fn is_retryable(&self) -> bool;

    fn is_timeout(&self) -> bool {
        false
    }
}

/// Run `operation` until it succeeds, fails permanently, or runs out of attempts.
/// The last error is returned unchanged.
pub async fn with_retry<T, E, F, Fut>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    E: Retryable + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        if attempt >= config.max_attempts || !config.should_retry(&error) {
            if attempt > 1 {
                tracing::warn!(attempts = attempt, "giving up: {}", error);
            }
            return Err(error);
        }

        let delay = config.jittered_backoff(attempt);
        tracing::warn!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            "transient failure, retrying: {}",
            error
        );
        tokio::time::sleep(delay).await;
    }
}
