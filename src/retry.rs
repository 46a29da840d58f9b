//! Bounded retry with exponential backoff and jitter.
//!
//! Shared by the transactional committer; classification of what counts as
//! transient stays with the caller.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::config::CommitRetryConfig;

/// Retry schedule parameters.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Always at least 1.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Fraction of the delay added as random jitter, e.g. 0.1 for +-0%..10%.
    pub jitter_factor: f64,
}

impl RetryPolicy {
    /// Delay before retrying after `failures` consecutive failures.
    pub fn backoff_delay(&self, failures: u32) -> Duration {
        let exp = failures.saturating_sub(1).min(32);
        let base = self
            .base_delay_ms
            .saturating_mul(1u64 << exp)
            .min(self.max_delay_ms);

        let jitter_range = (base as f64 * self.jitter_factor) as u64;
        let jitter = if jitter_range > 0 {
            rand::thread_rng().gen_range(0..=jitter_range)
        } else {
            0
        };

        Duration::from_millis(base.saturating_add(jitter))
    }
}

impl From<&CommitRetryConfig> for RetryPolicy {
    fn from(cfg: &CommitRetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            base_delay_ms: cfg.base_delay_ms,
            max_delay_ms: cfg.max_delay_ms,
            jitter_factor: cfg.jitter_factor,
        }
    }
}

/// Run `op` until it succeeds, the error is not transient, or the attempt
/// budget is exhausted. The last error is returned in the failure cases.
pub async fn with_backoff<T, E, Op, Fut, C>(
    policy: RetryPolicy,
    is_transient: C,
    mut op: Op,
) -> Result<T, E>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < max_attempts && is_transient(&err) => {
                let delay = policy.backoff_delay(attempt);
                warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient failure, backing off before retry"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
