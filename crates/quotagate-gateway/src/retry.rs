//! Capped exponential backoff for throttled directory calls.
//!
//! Delay before retry `n` (0-based) is `base_delay * multiplier^n`. After
//! `max_retries` retries the last `Throttled` error is returned. Only
//! retryable errors are retried; everything else returns immediately.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use quotagate_core::error::{QuotaGateError, Result};

use crate::config::RetrySection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub multiplier: u32,
}

impl RetryPolicy {
    pub fn from_config(cfg: &RetrySection) -> Self {
        Self {
            max_retries: cfg.max_retries,
            base_delay: Duration::from_millis(cfg.base_delay_ms),
            multiplier: cfg.multiplier,
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor)
    }
}

/// Sleep source, swapped for a recording fake in tests.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, d: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, d: Duration) {
        tokio::time::sleep(d).await;
    }
}

#[derive(Clone)]
pub struct Retry {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl Retry {
    pub fn new(policy: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { policy, sleeper }
    }

    /// Run `f` until it succeeds, fails with a non-retryable error, or the
    /// retry budget is spent. `f` is re-invoked from scratch on every attempt.
    pub async fn run<T, E, F, Fut>(&self, op: &'static str, mut f: F) -> Result<T>
    where
        E: Into<QuotaGateError>,
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let mut attempt = 0u32;
        loop {
            match f().await.map_err(Into::into) {
                Ok(v) => return Ok(v),
                Err(e) if e.is_retryable() && attempt < self.policy.max_retries => {
                    let delay = self.policy.delay_for(attempt);
                    tracing::warn!(op, attempt, delay_ms = delay.as_millis() as u64, "throttled, retrying");
                    self.sleeper.sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_retryable() {
                        tracing::error!(op, attempts = attempt + 1, "max retries reached");
                    }
                    return Err(e);
                }
            }
        }
    }
}
