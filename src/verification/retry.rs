//! Exponential backoff for oracle calls.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::config::RetryConfig;
use crate::error::{LlmError, OracleError, OracleKind};

/// Upper bound on a single backoff sleep.
const MAX_DELAY: Duration = Duration::from_secs(10);

/// Retry policy shared by the classifier and extractor steps.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// A policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay before retry number `retry` (0-based), with up to 25% jitter.
    fn delay_for(&self, retry: u32, err: &OracleError) -> Duration {
        if let OracleError::Call {
            source: LlmError::RateLimited {
                retry_after: Some(after),
                ..
            },
            ..
        } = err
        {
            return (*after).min(MAX_DELAY);
        }

        let base = self
            .base_delay
            .saturating_mul(2_u32.saturating_pow(retry))
            .min(MAX_DELAY);
        if base.is_zero() {
            return base;
        }
        let jitter_ms = rand::thread_rng().gen_range(0..=base.as_millis() as u64 / 4);
        base + Duration::from_millis(jitter_ms)
    }

    /// Run `operation` until it succeeds, fails permanently, or attempts run out.
    ///
    /// Running out of attempts yields `OracleError::Exhausted` carrying the
    /// last failure. Permanent failures (e.g. bad credentials) are returned
    /// as-is without further attempts.
    pub async fn run<T, F, Fut>(&self, oracle: OracleKind, mut operation: F) -> Result<T, OracleError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, OracleError>>,
    {
        let attempts = self.max_attempts();
        let mut attempt = 1;
        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !is_retryable(&err) {
                return Err(err);
            }
            if attempt >= attempts {
                return Err(OracleError::Exhausted {
                    oracle,
                    attempts,
                    last: err.to_string(),
                });
            }

            let delay = self.delay_for(attempt - 1, &err);
            warn!(
                oracle = %oracle,
                attempt,
                max_attempts = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Oracle call failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        (&RetryConfig::default()).into()
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(config.max_retries, config.base_delay)
    }
}

fn is_retryable(err: &OracleError) -> bool {
    match err {
        OracleError::Call { source, .. } => source.is_transient(),
        OracleError::Malformed { .. } => true,
        OracleError::Exhausted { .. } => false,
    }
}
