use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

use crate::error::BackendError;
use crate::error::StoreError;
use crate::error::StoreOperation;

/// Bounded exponential backoff for storage calls.
///
/// Attempt `n` (1-based) that fails is followed by a pause of
/// `initial_delay * multiplier^(n-1)`; the last attempt is not followed by a
/// pause. Pauses go through `tokio::time`, so paused-clock tests see them as
/// virtual time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(100), 2)
    }
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, initial_delay: Duration, multiplier: u32) -> Self {
        Self {
            max_attempts,
            initial_delay,
            multiplier,
        }
    }

    /// Single attempt, no pauses.
    pub const fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, 1)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(attempt.saturating_sub(1));
        self.initial_delay.saturating_mul(factor)
    }

    /// Every pause a fully failing operation sleeps through.
    pub fn schedule(&self) -> Vec<Duration> {
        (1..self.max_attempts())
            .map(|attempt| self.delay_after(attempt))
            .collect()
    }

    pub fn total_delay(&self) -> Duration {
        self.schedule().into_iter().sum()
    }

    pub async fn run<T, F, Fut>(&self, operation: StoreOperation, mut call: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let max_attempts = self.max_attempts();
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(source) if attempt >= max_attempts => {
                    return Err(StoreError::Exhausted {
                        operation,
                        attempts: attempt,
                        source,
                    });
                }
                Err(err) => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        %operation,
                        attempt,
                        retries_left = max_attempts - attempt,
                        delay_ms = delay.as_millis() as u64,
                        "storage {operation} failed: {err}"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
