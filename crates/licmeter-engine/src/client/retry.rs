//! Rate-limit retry with bounded exponential backoff

use licmeter_common::{ApiError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Outcome of one request attempt
#[derive(Debug)]
pub enum Attempt<T> {
    /// The call completed
    Done(T),
    /// The server answered 429, optionally with a `Retry-After` hint
    RateLimited { retry_after: Option<Duration> },
}

/// Backoff schedule for rate-limited calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 6,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based), `None` once exhausted
    pub fn delay_for(&self, retry: u32, retry_after: Option<Duration>) -> Option<Duration> {
        if retry >= self.max_retries {
            return None;
        }
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(retry.min(16)));
        let delay = retry_after.map_or(exp, |hint| hint.max(exp));
        Some(delay.min(self.max_delay))
    }

    /// Run `op` until it completes, is rate limited too often, or fails
    pub async fn run<T, F, Fut>(&self, url: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Attempt<T>>>,
    {
        let mut retry = 0u32;
        loop {
            match op().await? {
                Attempt::Done(value) => return Ok(value),
                Attempt::RateLimited { retry_after } => match self.delay_for(retry, retry_after) {
                    Some(delay) => {
                        warn!(%url, retry, delay_ms = delay.as_millis() as u64, "Rate limited, backing off");
                        tokio::time::sleep(delay).await;
                        retry += 1;
                    }
                    None => {
                        return Err(ApiError::RateLimited {
                            url: url.to_string(),
                            attempts: retry + 1,
                        }
                        .into())
                    }
                },
            }
        }
    }
}
