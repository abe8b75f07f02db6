//! One bounded retry with equal-jitter exponential backoff.

use std::time::Duration;

use lex_core::config::RetryConfig;
use lex_core::error::AppError;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub base_backoff: Duration,
}

impl RetryPolicy {
    /// Hard ceiling so a misconfigured policy cannot stall a request.
    pub const MAX_RETRIES: u32 = 1;

    pub fn new(retries: u32, base_backoff: Duration) -> Self {
        Self {
            retries: retries.min(Self::MAX_RETRIES),
            base_backoff,
        }
    }

    pub fn from_config(cfg: &RetryConfig) -> Self {
        Self::new(cfg.retries, Duration::from_millis(cfg.backoff_ms))
    }

    /// No retries and no sleeping; used in tests and for one-shot calls.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Run `op`, retrying only errors marked `retryable`.
    pub fn run<T>(&self, what: &str, mut op: impl FnMut() -> Result<T, AppError>) -> Result<T, AppError> {
        let mut attempt = 0u32;
        loop {
            match op() {
                Ok(v) => return Ok(v),
                Err(e) if e.retryable && attempt < self.retries => {
                    let delay = self.backoff(attempt);
                    debug!(what, attempt = attempt + 1, delay_ms = delay.as_millis() as u64, error = %e, "retrying after transient error");
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Equal jitter backoff: base/2 + rand(0, base/2).
    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.base_backoff.as_millis() as u64 * 2u64.pow(attempt);
        if base == 0 {
            return Duration::ZERO;
        }
        let half = base / 2;
        Duration::from_millis(half + fastrand::u64(..half.max(1)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
