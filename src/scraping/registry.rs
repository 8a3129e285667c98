//! Static registry of judge adapters
//!
//! Maps a platform name to the constructor of its adapter. Every adapter is
//! built explicitly from the scraper options and owns its own HTTP engine.

use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use super::contract::{Platform, Scraper};
use super::fetcher::FetchError;
use crate::config::ScraperConfig;
use crate::platforms::{atcoder, codechef, codeforces, cses};

/// Builds one adapter from scraper options
pub type Constructor = fn(&ScraperConfig) -> Result<Arc<dyn Platform>, FetchError>;

const ADAPTERS: &[(&str, Constructor)] = &[
    ("atcoder", atcoder::create),
    ("codechef", codechef::create),
    ("codeforces", codeforces::create),
    ("cses", cses::create),
];

/// Errors from adapter lookup
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Unknown platform '{name}'. Available: {}", available().join(", "))]
    UnknownPlatform { name: String },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] FetchError),
}

/// Names of every registered platform, sorted
pub fn available() -> Vec<&'static str> {
    ADAPTERS.iter().map(|(name, _)| *name).collect()
}

pub fn is_registered(name: &str) -> bool {
    ADAPTERS.iter().any(|(n, _)| *n == name)
}

/// Build the adapter registered under `name`
pub fn create(name: &str, config: &ScraperConfig) -> Result<Scraper, RegistryError> {
    let constructor = ADAPTERS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, c)| *c)
        .ok_or_else(|| RegistryError::UnknownPlatform {
            name: name.to_string(),
        })?;

    info!("Creating {} adapter", name);
    Ok(Scraper::new(constructor(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_adapter_is_constructible_and_named_by_its_key() {
        let config = ScraperConfig::default();
        for name in available() {
            let scraper = create(name, &config).unwrap();
            assert_eq!(scraper.name(), name);
        }
    }

    #[test]
    fn test_names_are_lowercase_without_whitespace() {
        let names = available();
        assert_eq!(names, vec!["atcoder", "codechef", "codeforces", "cses"]);
        for name in names {
            assert!(!name.is_empty());
            assert_eq!(name, name.to_lowercase());
            assert!(!name.chars().any(char::is_whitespace));
        }
    }

    #[test]
    fn test_out_of_range_seconds_still_build_an_adapter() {
        let config = ScraperConfig {
            rate_limit_delay: 1e20,
            max_backoff_seconds: f64::INFINITY,
            backoff_factor: f64::NAN,
            ..ScraperConfig::default()
        };
        assert!(create("cses", &config).is_ok());
    }

    #[test]
    fn test_unknown_platform() {
        let err = create("topcoder", &ScraperConfig::default()).unwrap_err();
        assert!(matches!(err, RegistryError::UnknownPlatform { .. }));
        assert!(err.to_string().contains("atcoder, codechef, codeforces, cses"));
        assert!(!is_registered("topcoder"));
        assert!(is_registered("cses"));
    }
}
