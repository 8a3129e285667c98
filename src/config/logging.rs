//! Logging configuration
//!
//! stdout carries result lines, so every subscriber writes to stderr.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How stderr log lines are rendered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    /// One JSON object per event, for log collectors
    Json,
}

/// Threshold, declared quietest first so that `-v` moves towards the end
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    const BY_VERBOSITY: [LogLevel; 5] = [
        LogLevel::Error,
        LogLevel::Warn,
        LogLevel::Info,
        LogLevel::Debug,
        LogLevel::Trace,
    ];

    /// `steps` levels noisier than `self`, stopping at trace
    pub fn louder(self, steps: u8) -> LogLevel {
        let index = (self as usize).saturating_add(steps as usize);
        Self::BY_VERBOSITY[index.min(Self::BY_VERBOSITY.len() - 1)]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `[logging]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Threshold for this crate's own events
    pub level: LogLevel,
}

impl LoggingConfig {
    /// Configured level raised by the `-v` count
    pub fn effective_level(&self, verbose: u8) -> LogLevel {
        self.level.louder(verbose)
    }

    /// `EnvFilter` directive: our events at the effective level, the HTTP
    /// stack never below warn
    pub fn filter_directive(&self, verbose: u8) -> String {
        let ours = self.effective_level(verbose);
        let deps = ours.min(LogLevel::Warn);
        format!("{},cpscrape={}", deps, ours)
    }
}
