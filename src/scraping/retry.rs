//! Retry/backoff policy for outbound judge requests
//!
//! Exponential backoff with full jitter: after the n-th failed attempt the
//! sleep is drawn uniformly from `[0, min(factor * base^(n-1), max_delay)]`,
//! raised to at least any `Retry-After` the server sent. Fatal failures are
//! returned immediately; retryable ones are retried until `max_tries`
//! attempts have been made, then the last error is returned.

use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{bounded_secs, ScraperConfig};

/// How a failed attempt should be treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Transient: try again, waiting at least `retry_after` when given
    Retryable { retry_after: Option<Duration> },
    /// Can never succeed as-is
    Fatal,
}

/// Errors that know whether they are worth retrying
pub trait Classify {
    fn classify(&self) -> RetryClass;
}

/// Attempt cap plus backoff shape, applied once per call site
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, first try included
    pub max_tries: u32,
    /// Exponential base
    pub base: f64,
    /// Multiplier applied to `base^(n-1)`
    pub factor: Duration,
    /// Cap on a single computed delay (before `Retry-After`)
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_tries: 5,
            base: 2.0,
            factor: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Policy described by the scraper options (`max_retries` is the total
    /// attempt count)
    pub fn from_config(config: &ScraperConfig) -> Self {
        Self {
            max_tries: config.max_retries.max(1),
            base: config.backoff_base.max(1.0),
            factor: bounded_secs(config.backoff_factor),
            max_delay: bounded_secs(config.max_backoff_seconds),
        }
    }

    pub fn with_max_tries(mut self, max_tries: u32) -> Self {
        self.max_tries = max_tries.max(1);
        self
    }

    /// Upper bound of the jittered delay after failed attempt `attempt` (1-based)
    pub fn backoff_ceiling(&self, attempt: u32) -> Duration {
        if self.factor.is_zero() {
            return Duration::ZERO;
        }
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.factor.as_secs_f64() * self.base.powi(exponent);
        let cap = self.max_delay.as_secs_f64();
        if !secs.is_finite() || secs > cap {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    /// Jittered delay after failed attempt `attempt`, honoring `retry_after`
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let ceiling = self.backoff_ceiling(attempt).as_secs_f64();
        let jittered = Duration::from_secs_f64(rand::rng().random_range(0.0..=ceiling));
        match retry_after {
            Some(min) => jittered.max(min),
            None => jittered,
        }
    }

    /// Sleep before the next attempt, or `None` to give up
    fn next_delay<E: Classify + Display>(&self, attempt: u32, err: &E) -> Option<Duration> {
        match err.classify() {
            RetryClass::Fatal => {
                debug!("Giving up after fatal error on attempt {}: {}", attempt, err);
                None
            }
            RetryClass::Retryable { .. } if attempt >= self.max_tries => {
                debug!("Giving up after {} attempts: {}", attempt, err);
                None
            }
            RetryClass::Retryable { retry_after } => {
                let delay = self.delay_for(attempt, retry_after);
                warn!(
                    attempt,
                    max_tries = self.max_tries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying request"
                );
                Some(delay)
            }
        }
    }

    /// Run `op` until it succeeds, fails fatally, or runs out of attempts.
    ///
    /// `op` receives the 1-based attempt number. The only suspension points
    /// are `op` itself and the backoff sleep.
    pub async fn retry<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        E: Classify + Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => match self.next_delay(attempt, &err) {
                    Some(delay) => {
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => return Err(err),
                },
            }
        }
    }

    /// Blocking counterpart of [`RetryPolicy::retry`] for synchronous clients
    pub fn retry_blocking<T, E, F>(&self, mut op: F) -> Result<T, E>
    where
        E: Classify + Display,
        F: FnMut(u32) -> Result<T, E>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(err) => match self.next_delay(attempt, &err) {
                    Some(delay) => {
                        std::thread::sleep(delay);
                        attempt += 1;
                    }
                    None => return Err(err),
                },
            }
        }
    }
}
