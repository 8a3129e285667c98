//! Adapter contract
//!
//! Defines the capability set every judge adapter implements and the single
//! boundary (`safe_execute`) past which no adapter error or panic travels.

use async_trait::async_trait;
use futures::FutureExt;
use std::fmt::{self, Debug};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use super::fanout::JobStream;
use super::fetcher::{FetchError, FetchStats};
use crate::types::{ContestListResult, MetadataResult, TestsResult};

/// Errors an adapter may return from its operations
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Network or HTTP failure after the retry policy gave up
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Contest, category or problem does not exist
    #[error("{0}")]
    NotFound(String),

    /// Expected markup is missing
    #[error("Parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type for adapter operations
pub type ScrapeResult<T> = Result<T, ScrapeError>;

/// The three public operations of an adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Metadata,
    Tests,
    Contests,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Metadata => "metadata",
            Self::Tests => "tests",
            Self::Contests => "contests",
        }
    }

    /// Parse a CLI mode name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "metadata" => Some(Self::Metadata),
            "tests" => Some(Self::Tests),
            "contests" => Some(Self::Contests),
            _ => None,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core trait for judge adapters
///
/// Implementations handle expected failures (empty listings, missing
/// contests) themselves and return the failure-shaped result; anything else
/// may be returned as an error and is converted by [`safe_execute`].
#[async_trait]
pub trait Platform: Send + Sync + Debug {
    /// Stable lowercase identifier ("atcoder"), used as registry key and
    /// error prefix
    fn name(&self) -> &'static str;

    /// Problem list of one contest or category
    async fn fetch_metadata(&self, contest_id: &str) -> ScrapeResult<MetadataResult>;

    /// Every contest or category the platform knows
    async fn fetch_contest_list(&self) -> ScrapeResult<ContestListResult>;

    /// Samples and limits of every problem in a category, delivered in
    /// completion order. Per-problem faults become failure records inside
    /// the stream.
    async fn stream_tests(&self, category_id: &str) -> ScrapeResult<JobStream<TestsResult>>;

    /// Fetch statistics of the adapter's HTTP engine
    fn stats(&self) -> Option<FetchStats> {
        None
    }
}

/// Results that have a failure shape for their operation
pub trait OperationResult: Sized {
    const KIND: OperationKind;

    /// Failure carrying `"<platform>: <error>"`; `key` is the id the
    /// operation was called with
    fn failure(platform: &str, error: &str, key: &str) -> Self;
}

impl OperationResult for MetadataResult {
    const KIND: OperationKind = OperationKind::Metadata;

    fn failure(platform: &str, error: &str, key: &str) -> Self {
        MetadataResult::failure(platform, error, key)
    }
}

impl OperationResult for ContestListResult {
    const KIND: OperationKind = OperationKind::Contests;

    fn failure(platform: &str, error: &str, _key: &str) -> Self {
        ContestListResult::failure(platform, error)
    }
}

impl OperationResult for JobStream<TestsResult> {
    const KIND: OperationKind = OperationKind::Tests;

    /// A stream holding one category-level failure record
    fn failure(platform: &str, error: &str, _key: &str) -> Self {
        JobStream::ready(vec![TestsResult::failure(platform, error, "", "")])
    }
}

/// Await `operation`, converting an error or a panic into the failure shape
/// of its result type.
pub async fn safe_execute<R, Fut>(platform: &str, key: &str, operation: Fut) -> R
where
    R: OperationResult,
    Fut: Future<Output = ScrapeResult<R>>,
{
    let description = match AssertUnwindSafe(operation).catch_unwind().await {
        Ok(Ok(result)) => return result,
        Ok(Err(err)) => err.to_string(),
        Err(payload) => {
            if let Some(s) = payload.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "adapter panicked".to_string()
            }
        }
    };

    warn!(
        platform,
        operation = R::KIND.as_str(),
        key,
        error = %description,
        "operation failed"
    );
    R::failure(platform, &description, key)
}

/// Public face of one adapter: every operation returns a well-formed result
#[derive(Debug, Clone)]
pub struct Scraper {
    platform: Arc<dyn Platform>,
}

impl Scraper {
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        Self { platform }
    }

    pub fn name(&self) -> &'static str {
        self.platform.name()
    }

    pub async fn metadata(&self, contest_id: &str) -> MetadataResult {
        info!("Fetching {} metadata for {}", self.name(), contest_id);
        safe_execute(
            self.name(),
            contest_id,
            self.platform.fetch_metadata(contest_id),
        )
        .await
    }

    pub async fn contests(&self) -> ContestListResult {
        info!("Fetching {} contest list", self.name());
        safe_execute(self.name(), "", self.platform.fetch_contest_list()).await
    }

    pub async fn tests(&self, category_id: &str) -> JobStream<TestsResult> {
        info!("Streaming {} tests for {}", self.name(), category_id);
        safe_execute(
            self.name(),
            category_id,
            self.platform.stream_tests(category_id),
        )
        .await
    }

    pub fn stats(&self) -> Option<FetchStats> {
        self.platform.stats()
    }
}
