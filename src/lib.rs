//! cpscrape: competitive-programming judge scraper
//!
//! Fetches contest problem lists, per-problem sample tests with execution
//! limits, and contest listings from online judges, normalized into one set
//! of JSON records:
//! - Platform adapters for AtCoder, Codeforces, CSES and CodeChef
//! - Retrying HTTP engine with exponential backoff and `Retry-After`
//! - Bounded concurrent fan-out streaming results as they complete
//! - Newline-delimited JSON output, one record per line

pub mod config;
pub mod platforms;
pub mod scraping;
pub mod types;

pub use config::Config;
pub use types::*;
