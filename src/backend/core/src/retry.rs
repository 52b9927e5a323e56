//! Bounded caller-side retries for transient backend failures.
//!
//! Only errors whose code is retryable (`Unavailable`, `Timeout`,
//! `CacheWriteFailure`) are retried; everything else returns on the first
//! attempt.

use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::{GateError, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// Retry Policy
// ═══════════════════════════════════════════════════════════════════════════════

/// Configuration for bounded retries with exponential backoff.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first (1 = no retries)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry
    #[serde(default = "default_initial_backoff", with = "humantime_serde")]
    pub initial_backoff: Duration,

    /// Upper bound for a single delay
    #[serde(default = "default_max_backoff", with = "humantime_serde")]
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff: default_initial_backoff(),
            max_backoff: default_max_backoff(),
        }
    }
}

fn default_max_attempts() -> u32 { 3 }
fn default_initial_backoff() -> Duration { Duration::from_millis(50) }
fn default_max_backoff() -> Duration { Duration::from_secs(1) }

impl RetryPolicy {
    /// Check if another attempt should be made after `attempt` failed.
    pub fn should_retry(&self, attempt: u32, error: &GateError) -> bool {
        attempt < self.max_attempts && error.is_retryable()
    }

    /// Delay before attempt number `attempt + 1`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(error) if self.should_retry(attempt, &error) => {
                    let delay = self.delay_for_attempt(attempt);
                    debug!(
                        attempt,
                        error_code = %error.code(),
                        delay_ms = delay.as_millis() as u64,
                        "retrying transient failure"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

/// Retry `op` up to `max_attempts` times with exponential backoff starting at `backoff`.
pub async fn retry_transient<T, F, Fut>(max_attempts: u32, backoff: Duration, op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let policy = RetryPolicy {
        max_attempts: max_attempts.max(1),
        initial_backoff: backoff,
        max_backoff: backoff.saturating_mul(8).max(default_max_backoff()),
    };
    policy.run(op).await
}
