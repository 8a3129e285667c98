//! Positional argument validation
//!
//! clap collects `<platform> <mode> [id]` loosely so that a malformed call can
//! still be answered with one failure-shaped JSON line instead of clap's
//! plain-text error.

use cpscrape::scraping::{registry, OperationKind};
use cpscrape::{ContestListResult, MetadataResult, TestsResult};
use serde_json::Value;

/// A well-formed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Metadata { platform: String, contest_id: String },
    Tests { platform: String, contest_id: String },
    Contests { platform: String },
}

impl Invocation {
    pub fn platform(&self) -> &str {
        match self {
            Self::Metadata { platform, .. }
            | Self::Tests { platform, .. }
            | Self::Contests { platform } => platform,
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Metadata { .. } => OperationKind::Metadata,
            Self::Tests { .. } => OperationKind::Tests,
            Self::Contests { .. } => OperationKind::Contests,
        }
    }
}

/// A malformed request, answered in the shape of the mode it asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageError {
    pub kind: OperationKind,
    pub message: String,
}

impl UsageError {
    pub fn new(kind: OperationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// General usage text in the metadata shape
    pub fn general() -> Self {
        Self::new(
            OperationKind::Metadata,
            "Usage: cpscrape <platform> metadata <contest_id> OR cpscrape <platform> tests <contest_id> OR cpscrape <platform> contests",
        )
    }

    /// The failure record printed for this error
    pub fn to_record(&self) -> Value {
        failure_record(self.kind, &self.message)
    }
}

/// Unprefixed failure record of the given operation's shape
pub fn failure_record(kind: OperationKind, message: &str) -> Value {
    let record = match kind {
        OperationKind::Metadata => serde_json::to_value(MetadataResult {
            success: false,
            error: message.to_string(),
            contest_id: String::new(),
            problems: Vec::new(),
            url: String::new(),
        }),
        OperationKind::Tests => serde_json::to_value(TestsResult {
            success: false,
            error: message.to_string(),
            ..TestsResult::new("", "")
        }),
        OperationKind::Contests => serde_json::to_value(ContestListResult {
            success: false,
            error: message.to_string(),
            contests: Vec::new(),
        }),
    };
    record.unwrap_or(Value::Null)
}

/// Validate the positional arguments
pub fn parse(
    platform: Option<String>,
    mode: Option<String>,
    args: Vec<String>,
) -> Result<Invocation, UsageError> {
    let (Some(platform), Some(mode)) = (platform, mode) else {
        return Err(UsageError::general());
    };

    if !registry::is_registered(&platform) {
        return Err(UsageError::new(
            OperationKind::Metadata,
            format!(
                "Unknown platform '{}'. Available: {}",
                platform,
                registry::available().join(", ")
            ),
        ));
    }

    let Some(kind) = OperationKind::from_name(&mode) else {
        return Err(UsageError::new(
            OperationKind::Metadata,
            format!(
                "Unknown mode: {}. Use 'metadata <contest_id>', 'tests <contest_id>', or 'contests'",
                mode
            ),
        ));
    };

    match kind {
        OperationKind::Metadata | OperationKind::Tests => {
            let [contest_id] = <[String; 1]>::try_from(args).map_err(|_| {
                UsageError::new(
                    kind,
                    format!("Usage: cpscrape {} {} <contest_id>", platform, kind),
                )
            })?;
            Ok(match kind {
                OperationKind::Metadata => Invocation::Metadata {
                    platform,
                    contest_id,
                },
                _ => Invocation::Tests {
                    platform,
                    contest_id,
                },
            })
        }
        OperationKind::Contests => {
            if !args.is_empty() {
                return Err(UsageError::new(
                    kind,
                    format!("Usage: cpscrape {} contests", platform),
                ));
            }
            Ok(Invocation::Contests { platform })
        }
    }
}
