//! Fetch engine for judge pages and APIs
//!
//! One `reqwest::Client` per adapter, built explicitly from the scraper
//! options and shared by all of that adapter's jobs. Every request goes
//! through the adapter's [`RetryPolicy`].

use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;
use url::Url;

use super::retry::{Classify, RetryClass, RetryPolicy};
use crate::config::ScraperConfig;

/// Statuses worth another attempt
pub const RETRY_STATUS: &[u16] = &[429, 502, 503, 504];

/// Errors that can occur during fetching
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {status} for {url}")]
    Status {
        status: u16,
        url: String,
        retry_after: Option<Duration>,
    },
    #[error("Failed to parse URL: {0}")]
    InvalidUrl(String),
    #[error("Invalid JSON from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl FetchError {
    /// HTTP status of a non-success response
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

impl Classify for FetchError {
    fn classify(&self) -> RetryClass {
        match self {
            Self::Status {
                status,
                retry_after,
                ..
            } => classify_status(*status, *retry_after),
            Self::Http(e) if e.is_builder() || e.is_redirect() => RetryClass::Fatal,
            // a stalled body read is a timeout, not a malformed body
            Self::Http(e) if (e.is_body() || e.is_decode()) && !e.is_timeout() => RetryClass::Fatal,
            Self::Http(e) => match e.status() {
                Some(status) => classify_status(status.as_u16(), None),
                // connect, timeout or reset
                None => RetryClass::Retryable { retry_after: None },
            },
            Self::InvalidUrl(_) | Self::Decode { .. } => RetryClass::Fatal,
        }
    }
}

/// Retryable: 429/502/503/504 and any other 5xx. Fatal: every other status.
pub fn classify_status(status: u16, retry_after: Option<Duration>) -> RetryClass {
    if RETRY_STATUS.contains(&status) || ((500..600).contains(&status) && status != 501) {
        RetryClass::Retryable { retry_after }
    } else {
        RetryClass::Fatal
    }
}

/// Longest `Retry-After` honored; larger values are clamped to it
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(600);

/// Parse a `Retry-After` value given in (possibly fractional) seconds
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let secs: f64 = value.trim().parse().ok()?;
    if secs.is_nan() || secs < 0.0 {
        return None;
    }
    let delay = Duration::try_from_secs_f64(secs).unwrap_or(MAX_RETRY_AFTER);
    Some(delay.min(MAX_RETRY_AFTER))
}

/// Fetch statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// Total attempts sent
    pub total_fetches: u64,
    /// Attempts beyond the first of a request
    pub retries: u64,
    /// Requests that ended successfully
    pub successes: u64,
    /// Requests that ended in an error after all attempts
    pub failures: u64,
}

#[derive(Debug, Default)]
struct AtomicStats {
    total_fetches: AtomicU64,
    retries: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
}

/// Shared HTTP fetcher with retry and politeness pause
#[derive(Debug)]
pub struct FetchEngine {
    http_client: reqwest::Client,
    policy: RetryPolicy,
    rate_limit_delay: Duration,
    stats: AtomicStats,
}

impl FetchEngine {
    /// Create a fetch engine from scraper options
    pub fn new(config: &ScraperConfig) -> Result<Self, FetchError> {
        let pool_size = config.max_concurrency.max(config.api_concurrency);
        let http_client = reqwest::Client::builder()
            .pool_max_idle_per_host(pool_size)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(config.timeout())
            .connect_timeout(config.timeout().min(Duration::from_secs(10)))
            .redirect(reqwest::redirect::Policy::limited(10))
            .user_agent(&config.user_agent)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            http_client,
            policy: RetryPolicy::from_config(config),
            rate_limit_delay: config.rate_limit_delay(),
            stats: AtomicStats::default(),
        })
    }

    /// GET `url` and return the body text
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let result = self.fetch_with_retry(url).await;
        self.settle(result).await
    }

    /// GET `url` and decode the body as JSON; a body that does not decode
    /// counts as a failed request
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let result = self.fetch_with_retry(url).await.and_then(|body| {
            serde_json::from_str(&body).map_err(|source| FetchError::Decode {
                url: url.to_string(),
                source,
            })
        });
        self.settle(result).await
    }

    async fn fetch_with_retry(&self, url: &str) -> Result<String, FetchError> {
        self.policy
            .retry(move |attempt| self.fetch_once(url, attempt))
            .await
    }

    /// Record the outcome of a request; successes are followed by the
    /// politeness pause
    async fn settle<T>(&self, result: Result<T, FetchError>) -> Result<T, FetchError> {
        match &result {
            Ok(_) => {
                self.stats.successes.fetch_add(1, Ordering::Relaxed);
                if !self.rate_limit_delay.is_zero() {
                    tokio::time::sleep(self.rate_limit_delay).await;
                }
            }
            Err(_) => {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
            }
        }
        result
    }

    /// One attempt: send, map non-success statuses, read the body
    async fn fetch_once(&self, url: &str, attempt: u32) -> Result<String, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", url, e)))?;

        self.stats.total_fetches.fetch_add(1, Ordering::Relaxed);
        if attempt > 1 {
            self.stats.retries.fetch_add(1, Ordering::Relaxed);
        }

        let start = Instant::now();
        let response = self.http_client.get(parsed).send().await?;
        let status = response.status();

        debug!(
            "GET {} -> {} in {}ms (attempt {})",
            url,
            status.as_u16(),
            start.elapsed().as_millis(),
            attempt
        );

        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);

            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
                retry_after,
            });
        }

        Ok(response.text().await?)
    }

    /// Get fetch statistics
    pub fn stats(&self) -> FetchStats {
        FetchStats {
            total_fetches: self.stats.total_fetches.load(Ordering::Relaxed),
            retries: self.stats.retries.load(Ordering::Relaxed),
            successes: self.stats.successes.load(Ordering::Relaxed),
            failures: self.stats.failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_error(status: u16) -> FetchError {
        FetchError::Status {
            status,
            url: "https://example.com".to_string(),
            retry_after: None,
        }
    }

    #[test]
    fn test_status_classification() {
        for status in [429, 502, 503, 504, 500] {
            assert!(
                matches!(status_error(status).classify(), RetryClass::Retryable { .. }),
                "{} should be retryable",
                status
            );
        }
        for status in [400, 401, 403, 404, 410, 418, 501] {
            assert_eq!(status_error(status).classify(), RetryClass::Fatal, "{}", status);
        }
    }

    #[test]
    fn test_retry_after_travels_with_classification() {
        let err = FetchError::Status {
            status: 429,
            url: "https://example.com".to_string(),
            retry_after: Some(Duration::from_secs(2)),
        };
        assert_eq!(
            err.classify(),
            RetryClass::Retryable {
                retry_after: Some(Duration::from_secs(2))
            }
        );
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after("2"), Some(Duration::from_secs(2)));
        assert_eq!(parse_retry_after(" 0.5 "), Some(Duration::from_millis(500)));
        assert_eq!(parse_retry_after("-1"), None);
        assert_eq!(parse_retry_after("NaN"), None);
        assert_eq!(parse_retry_after("1e30"), Some(MAX_RETRY_AFTER));
        assert_eq!(parse_retry_after("inf"), Some(MAX_RETRY_AFTER));
        assert_eq!(parse_retry_after("3600"), Some(MAX_RETRY_AFTER));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }

    #[test]
    fn test_not_found_detection() {
        assert!(status_error(404).is_not_found());
        assert!(!status_error(403).is_not_found());
        assert!(!FetchError::InvalidUrl("x".to_string()).is_not_found());
    }

    #[test]
    fn test_decode_errors_are_fatal() {
        let err = FetchError::Decode {
            url: "https://example.com/api".to_string(),
            source: serde_json::from_str::<serde_json::Value>("<html>").unwrap_err(),
        };
        assert_eq!(err.classify(), RetryClass::Fatal);
    }

    #[tokio::test]
    async fn test_invalid_url_is_fatal_and_counted_as_failure() {
        let engine = FetchEngine::new(&ScraperConfig::default()).unwrap();

        let err = engine.get_text("not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));

        let stats = engine.stats();
        assert_eq!(stats.total_fetches, 0);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.successes, 0);
    }
}
