use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// How a failed attempt should be treated.
#[derive(Debug)]
pub enum Attempt<E> {
    /// Transient (network error, 5xx, 408, 429). Worth another try.
    Transient(E),
    /// The collaborator rejected the request. Retrying will not help.
    Permanent(E),
}

/// Capped exponential backoff for collaborator calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub first_delay: Duration,
    pub max_delay: Duration,
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            first_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(800),
            jitter: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based), without jitter.
    pub fn base_delay(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        self.first_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    fn delay(&self, retry: u32) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let extra = if jitter_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..=jitter_ms)
        };
        self.base_delay(retry) + Duration::from_millis(extra)
    }
}

/// Runs `op` until it succeeds, fails permanently, or the policy runs out.
pub async fn with_retry<F, Fut, T, E>(policy: RetryPolicy, what: &str, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Attempt<E>>>,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(Attempt::Permanent(e)) => {
                tracing::debug!(error = %e, attempt, "{} rejected, not retrying", what);
                return Err(e);
            }
            Err(Attempt::Transient(e)) if attempt >= max_attempts => {
                tracing::debug!(error = %e, attempt, "{} failed, giving up", what);
                return Err(e);
            }
            Err(Attempt::Transient(e)) => {
                let delay = policy.delay(attempt);
                tracing::debug!(
                    error = %e,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "{} failed, retrying",
                    what
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
