//! Scraper options: timeouts, retry/backoff, politeness and fan-out ceilings

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use super::DEFAULT_USER_AGENT;

/// Upper bound for every seconds-valued option
pub const MAX_SECONDS: f64 = 3600.0;

/// Seconds to a `Duration`, clamped to `[0, MAX_SECONDS]`; NaN is zero
pub fn bounded_secs(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs.clamp(0.0, MAX_SECONDS)).unwrap_or(Duration::ZERO)
}

/// Per-adapter scraping options
///
/// Every field has a documented default so an empty `[scraper]` table (or no
/// config file at all) is a working configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// Per-request timeout (seconds)
    pub timeout_seconds: u64,
    /// Total attempts per request, first try included
    pub max_retries: u32,
    /// Exponential backoff base
    pub backoff_base: f64,
    /// Backoff multiplier (seconds)
    pub backoff_factor: f64,
    /// Upper bound of a single computed backoff (seconds)
    pub max_backoff_seconds: f64,
    /// Pause after every successful request (seconds)
    pub rate_limit_delay: f64,
    /// Fan-out ceiling for HTML page fetches
    pub max_concurrency: usize,
    /// Fan-out ceiling for lightweight JSON API calls
    pub api_concurrency: usize,
    /// User agent sent with every request
    pub user_agent: String,
    /// Stop streaming tests after this many seconds (no deadline when unset)
    pub deadline_seconds: Option<u64>,
    /// Base URL overrides keyed by platform name
    pub base_urls: HashMap<String, String>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            max_retries: 3,
            backoff_base: 2.0,
            backoff_factor: 1.0,
            max_backoff_seconds: 60.0,
            rate_limit_delay: 1.0,
            max_concurrency: 8,
            api_concurrency: 16,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            deadline_seconds: None,
            base_urls: HashMap::new(),
        }
    }
}

impl ScraperConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn rate_limit_delay(&self) -> Duration {
        bounded_secs(self.rate_limit_delay)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_seconds.map(Duration::from_secs)
    }

    /// Base URL for a platform, honoring overrides; never ends with `/`
    pub fn base_url(&self, platform: &str, default: &str) -> String {
        self.base_urls
            .get(platform)
            .map(String::as_str)
            .unwrap_or(default)
            .trim_end_matches('/')
            .to_string()
    }

    /// Collect validation errors into `errors`
    pub(super) fn validate_into(&self, errors: &mut Vec<String>) {
        if self.timeout_seconds == 0 {
            errors.push("scraper.timeout_seconds must be positive".to_string());
        } else if self.timeout_seconds as f64 > MAX_SECONDS {
            errors.push(format!("scraper.timeout_seconds must be at most {}", MAX_SECONDS));
        }
        if self.max_retries == 0 {
            errors.push("scraper.max_retries must be at least 1".to_string());
        }
        if !(self.backoff_base >= 1.0 && self.backoff_base.is_finite()) {
            errors.push("scraper.backoff_base must be >= 1.0 and finite".to_string());
        }
        let seconds = [
            ("backoff_factor", self.backoff_factor),
            ("max_backoff_seconds", self.max_backoff_seconds),
            ("rate_limit_delay", self.rate_limit_delay),
        ];
        for (name, value) in seconds {
            // NaN fails the range check too
            if !(0.0..=MAX_SECONDS).contains(&value) {
                errors.push(format!(
                    "scraper.{} must be between 0 and {} seconds, got {}",
                    name, MAX_SECONDS, value
                ));
            }
        }
        if let Some(deadline) = self.deadline_seconds {
            if deadline == 0 {
                errors.push("scraper.deadline_seconds must be positive".to_string());
            }
        }
        if self.max_concurrency == 0 {
            errors.push("scraper.max_concurrency must be positive".to_string());
        }
        if self.api_concurrency == 0 {
            errors.push("scraper.api_concurrency must be positive".to_string());
        }
        for (platform, url) in &self.base_urls {
            if url::Url::parse(url).is_err() {
                errors.push(format!("scraper.base_urls.{} is not a valid URL: {}", platform, url));
            }
        }
    }
}
