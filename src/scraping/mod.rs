//! Scraping core shared by every judge adapter
//!
//! Key components:
//! - `FetchEngine`: explicitly constructed HTTP client with retry and a
//!   politeness pause
//! - `RetryPolicy`: exponential backoff with full jitter and `Retry-After`
//! - `fanout`: bounded concurrent jobs streamed in completion order
//! - `Platform` / `Scraper`: the adapter contract and its error boundary
//! - `registry`: platform name to adapter constructor
//! - `output`: newline-delimited JSON writer

pub mod contract;
pub mod fanout;
pub mod fetcher;
pub mod output;
pub mod registry;
pub mod retry;
pub mod text;

pub use contract::{OperationKind, Platform, ScrapeError, ScrapeResult, Scraper};
pub use fanout::JobStream;
pub use fetcher::{FetchEngine, FetchError, FetchStats};
pub use retry::{Classify, RetryClass, RetryPolicy};
