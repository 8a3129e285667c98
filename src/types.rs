//! Result model shared by every platform adapter
//!
//! All records are plain values: built once from a parsed response, serialized
//! to one JSON line, then dropped. Failure-shaped records always carry an
//! error prefixed with the platform name (`"<platform>: <description>"`).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Build the uniform `"<platform>: <description>"` error string
pub fn prefixed_error(platform: &str, error: impl fmt::Display) -> String {
    format!("{}: {}", platform, error)
}

// ============================================================================
// Summaries
// ============================================================================

/// One problem of a contest or category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemSummary {
    /// Short lowercase slug, unique within the contest ("a", "1068")
    pub id: String,
    pub name: String,
}

impl ProblemSummary {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// One contest (or category) known to a platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContestSummary {
    pub id: String,
    /// Raw title as published
    pub name: String,
    /// Human title, possibly reformatted (often equal to `name`)
    pub display_name: String,
}

impl ContestSummary {
    /// Summary whose display name is the raw name
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: id.into(),
            display_name: name.clone(),
            name,
        }
    }
}

// ============================================================================
// Sample tests
// ============================================================================

/// Normalize raw sample text: drop `\r`, map NBSP to space, trim trailing
/// whitespace on every line and surrounding whitespace overall.
pub fn normalize_sample(raw: &str) -> String {
    let cleaned = raw.replace('\r', "").replace('\u{a0}', " ");
    let lines: Vec<&str> = cleaned.lines().map(str::trim_end).collect();
    lines.join("\n").trim().to_string()
}

/// One sample test: program stdin and expected stdout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    pub expected: String,
}

impl TestCase {
    /// Build a test case from raw page text, normalizing both sides
    pub fn new(input: &str, expected: &str) -> Self {
        Self {
            input: normalize_sample(input),
            expected: normalize_sample(expected),
        }
    }
}

/// All samples of a problem as one multiplexed judge invocation
///
/// Only produced by adapters whose pages publish a multi-test sample (the
/// input starts with the case count). See `platforms::codeforces`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinedTest {
    pub input: String,
    pub expected: String,
}

// ============================================================================
// Operation results
// ============================================================================

/// Problem list of one contest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataResult {
    pub success: bool,
    pub error: String,
    pub contest_id: String,
    pub problems: Vec<ProblemSummary>,
    /// Problem URL template; `%s` stands for a problem id
    pub url: String,
}

impl MetadataResult {
    /// Successful result, or the "No problems found" failure when `problems`
    /// is empty.
    pub fn from_problems(
        platform: &str,
        contest_id: &str,
        problems: Vec<ProblemSummary>,
        url: impl Into<String>,
    ) -> Self {
        if problems.is_empty() {
            return Self::failure(
                platform,
                format!("No problems found for contest {}", contest_id),
                contest_id,
            );
        }

        Self {
            success: true,
            error: String::new(),
            contest_id: contest_id.to_string(),
            problems,
            url: url.into(),
        }
    }

    pub fn failure(platform: &str, error: impl fmt::Display, contest_id: &str) -> Self {
        Self {
            success: false,
            error: prefixed_error(platform, error),
            contest_id: contest_id.to_string(),
            problems: Vec::new(),
            url: String::new(),
        }
    }
}

/// Every contest or category of a platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContestListResult {
    pub success: bool,
    pub error: String,
    pub contests: Vec<ContestSummary>,
}

impl ContestListResult {
    /// Successful result, or the "No contests found" failure when empty
    pub fn from_contests(platform: &str, contests: Vec<ContestSummary>) -> Self {
        if contests.is_empty() {
            return Self::failure(platform, "No contests found");
        }

        Self {
            success: true,
            error: String::new(),
            contests,
        }
    }

    pub fn failure(platform: &str, error: impl fmt::Display) -> Self {
        Self {
            success: false,
            error: prefixed_error(platform, error),
            contests: Vec::new(),
        }
    }
}

/// Samples and execution limits of one problem; one streamed line each
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestsResult {
    pub success: bool,
    pub error: String,
    pub problem_id: String,
    pub url: String,
    pub tests: Vec<TestCase>,
    /// Time limit in milliseconds, 0 when unknown
    pub timeout_ms: u64,
    /// Memory limit in megabytes, 0.0 when unknown
    pub memory_mb: f64,
    /// Needs a live judge process; samples alone cannot validate it
    pub interactive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub combined: Option<CombinedTest>,
}

impl TestsResult {
    /// Successful result with no samples or limits yet
    pub fn new(problem_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            success: true,
            error: String::new(),
            problem_id: problem_id.into(),
            url: url.into(),
            tests: Vec::new(),
            timeout_ms: 0,
            memory_mb: 0.0,
            interactive: false,
            combined: None,
        }
    }

    pub fn with_tests(mut self, tests: Vec<TestCase>) -> Self {
        self.tests = tests;
        self
    }

    pub fn with_limits(mut self, timeout_ms: u64, memory_mb: f64) -> Self {
        self.timeout_ms = timeout_ms;
        self.memory_mb = memory_mb;
        self
    }

    pub fn with_interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    pub fn with_combined(mut self, combined: Option<CombinedTest>) -> Self {
        self.combined = combined;
        self
    }

    pub fn failure(
        platform: &str,
        error: impl fmt::Display,
        problem_id: &str,
        url: &str,
    ) -> Self {
        Self {
            success: false,
            error: prefixed_error(platform, error),
            ..Self::new(problem_id, url)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_sample_strips_cr_and_trailing_space() {
        assert_eq!(normalize_sample("3\r\n1 2 3  \r\n"), "3\n1 2 3");
        assert_eq!(normalize_sample("\n\n6\n\n"), "6");
        assert_eq!(normalize_sample("a\u{a0}b"), "a b");
    }

    #[test]
    fn test_normalize_sample_keeps_inner_blank_lines() {
        assert_eq!(normalize_sample("1\n\n2\n"), "1\n\n2");
    }

    #[test]
    fn test_metadata_from_problems_success() {
        let result = MetadataResult::from_problems(
            "atcoder",
            "abc100",
            vec![ProblemSummary::new("a", "Happy Birthday!")],
            "https://atcoder.jp/contests/abc100/tasks/abc100_%s",
        );

        assert!(result.success);
        assert!(result.error.is_empty());
        assert_eq!(result.problems.len(), 1);
    }

    #[test]
    fn test_metadata_from_empty_problems_is_failure() {
        let result = MetadataResult::from_problems("atcoder", "nope", vec![], "ignored");

        assert!(!result.success);
        assert_eq!(result.error, "atcoder: No problems found for contest nope");
        assert!(result.problems.is_empty());
        assert!(result.url.is_empty());
        assert_eq!(result.contest_id, "nope");
    }

    #[test]
    fn test_contest_list_invariant() {
        let empty = ContestListResult::from_contests("cses", vec![]);
        assert!(!empty.success);
        assert_eq!(empty.error, "cses: No contests found");

        let full = ContestListResult::from_contests(
            "cses",
            vec![ContestSummary::new("graph_algorithms", "Graph Algorithms")],
        );
        assert!(full.success);
        assert!(full.error.is_empty());
        assert_eq!(full.contests[0].display_name, "Graph Algorithms");
    }

    #[test]
    fn test_tests_failure_keeps_identity() {
        let result = TestsResult::failure("cses", "no tests found", "1068", "https://cses.fi/x");

        assert!(!result.success);
        assert_eq!(result.problem_id, "1068");
        assert_eq!(result.url, "https://cses.fi/x");
        assert!(result.tests.is_empty());
        assert_eq!(result.timeout_ms, 0);
    }

    #[test]
    fn test_tests_result_serializes_without_combined() {
        let result = TestsResult::new("a", "")
            .with_tests(vec![TestCase::new("3\n1 2 3", "6")])
            .with_limits(2000, 1024.0);

        let json = serde_json::to_string(&result).unwrap();
        assert!(!json.contains("combined"));
        assert!(!json.contains('\n'));

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["problem_id"], "a");
        assert_eq!(value["tests"][0]["expected"], "6");
        assert_eq!(value["timeout_ms"], 2000);
        assert_eq!(value["interactive"], false);
    }
}
