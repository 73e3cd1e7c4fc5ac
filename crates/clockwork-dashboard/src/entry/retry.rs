use clockwork_core::models::RetryConfig;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Linear backoff: the wait before attempt `n` (0-based) is `n * backoff_step`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_step: Duration,
}

/// Every attempt failed; carries the last failure
#[derive(Debug)]
pub struct Exhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_step: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_step,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, config.backoff_step())
    }

    pub fn delay_before(&self, attempt: u32) -> Duration {
        self.backoff_step * attempt
    }

    /// Run `operation` until it succeeds or the attempts run out.
    ///
    /// Every error is treated as transient.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, Exhausted<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 0;
        loop {
            if attempt > 0 {
                let delay = self.delay_before(attempt);
                tracing::debug!("Retrying {} in {:?}", label, delay);
                tokio::time::sleep(delay).await;
            }

            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        tracing::warn!("{} failed after {} attempts: {}", label, attempt, err);
                        return Err(Exhausted {
                            attempts: attempt,
                            last_error: err,
                        });
                    }
                    tracing::warn!(
                        "{} failed (attempt {}/{}): {}",
                        label,
                        attempt,
                        self.max_attempts,
                        err
                    );
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
