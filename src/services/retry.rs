use std::future::Future;
use std::time::{Duration, Instant};

use rand::{rng, Rng};
use tokio::time::sleep;
use tracing::{error, warn};

use crate::error::Result;

const MAX_DELAY: Duration = Duration::from_secs(30);
const MAX_JITTER_MS: u64 = 250;

/// Bounded exponential backoff for transient failures.
///
/// The delay before retry `n` (1-based) is `base_delay * 2^(n-1)`, capped at
/// `max_delay`, plus up to 250 ms of random jitter so parallel workers do not
/// retry in lockstep. Only errors for which [`crate::error::AppError::is_transient`] holds are
/// retried; everything else is returned immediately.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay: MAX_DELAY,
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1 << exp).min(self.max_delay)
    }

    /// [`Self::delay_for`] plus random jitter.
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let jitter_ms: u64 = rng().random_range(0..=MAX_JITTER_MS);
        self.delay_for(attempt) + Duration::from_millis(jitter_ms)
    }

    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let mut attempt = 0u32;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        if self.max_retries > 0 {
                            error!(
                                label,
                                attempts = attempt,
                                elapsed_ms = started.elapsed().as_millis() as u64,
                                error = %e,
                                "exhausted retries"
                            );
                        }
                        return Err(e);
                    }
                    let delay = self.jittered_delay(attempt);
                    warn!(
                        label,
                        attempt,
                        max = self.max_retries,
                        ?delay,
                        error = %e,
                        "transient failure; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, Duration::from_secs(1))
    }
}
