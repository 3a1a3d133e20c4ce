//! Retry executor — bounded re-execution of multi-step store units.
//!
//! DESIGN
//! ======
//! Every multi-step write runs as a unit of work under a [`RetryPolicy`].
//! The policy re-runs the unit only for errors classified retryable by
//! [`ErrorCode::retryable`]; validation failures propagate on the first
//! attempt. The unit owns its transaction boundary — a failed attempt has
//! rolled back by the time the next attempt starts, so re-running cannot
//! leave partial audit or notification rows behind.
//!
//! OBSERVABILITY
//! =============
//! Every attempt logs the call-site label, attempt number, and elapsed
//! milliseconds, success or failure.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::config::env_parse;
use crate::error::ErrorCode;

const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_DELAY_MS: u64 = 2000;

/// Explicit retry policy: attempt ceiling and fixed inter-attempt delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// Policy from `AUTH_RETRY_MAX_ATTEMPTS` / `AUTH_RETRY_DELAY_MS`,
    /// defaulting to 3 attempts 2000ms apart.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            max_attempts: env_parse("AUTH_RETRY_MAX_ATTEMPTS", DEFAULT_RETRY_MAX_ATTEMPTS),
            delay: Duration::from_millis(env_parse("AUTH_RETRY_DELAY_MS", DEFAULT_RETRY_DELAY_MS)),
        }
    }

    /// Run `unit` until it succeeds, fails non-retryably, or exhausts the
    /// attempt ceiling. `op` labels the call site in logs.
    ///
    /// # Errors
    ///
    /// Returns the unit's last error once retries are exhausted, or its
    /// first non-retryable error immediately.
    pub async fn run<T, E>(&self, op: &'static str, mut unit: impl AsyncFnMut() -> Result<T, E>) -> Result<T, E>
    where
        E: ErrorCode,
    {
        let mut attempt: u32 = 1;
        loop {
            let started = Instant::now();
            match unit().await {
                Ok(value) => {
                    debug!(op, attempt, elapsed_ms = elapsed_ms(started), "unit of work succeeded");
                    return Ok(value);
                }
                Err(e) if e.retryable() && attempt < self.max_attempts => {
                    warn!(
                        op,
                        attempt,
                        total = self.max_attempts,
                        error = %e,
                        code = e.error_code(),
                        elapsed_ms = elapsed_ms(started),
                        "unit of work failed; retrying"
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(
                        op,
                        attempt,
                        total = self.max_attempts,
                        error = %e,
                        code = e.error_code(),
                        elapsed_ms = elapsed_ms(started),
                        "unit of work failed; giving up"
                    );
                    return Err(e);
                }
            }
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
#[path = "retry_test.rs"]
mod tests;
