//! CodeChef adapter
//!
//! Starters contests through the JSON API. Contest ids are the public code
//! ("START120"); problems are read from its division 4 variant
//! ("START120D"), which carries the full problem list.

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::debug;

use crate::config::ScraperConfig;
use crate::scraping::contract::{Platform, ScrapeError, ScrapeResult};
use crate::scraping::fanout::{self, JobStream};
use crate::scraping::fetcher::{FetchEngine, FetchError, FetchStats};
use crate::types::{
    ContestListResult, ContestSummary, MetadataResult, ProblemSummary, TestCase, TestsResult,
};

pub const NAME: &str = "codechef";
pub const DEFAULT_BASE_URL: &str = "https://www.codechef.com";

/// Used when the problem page cannot be read
pub const DEFAULT_MEMORY_MB: f64 = 256.0;

/// Used when the API omits `max_timelimit`
const DEFAULT_TIME_LIMIT_SECS: f64 = 1.0;

static STARTERS_RE: OnceLock<Regex> = OnceLock::new();
static MEMORY_LIMIT_RE: OnceLock<Regex> = OnceLock::new();

/// Division 4 code of a contest
pub fn div4_id(contest_id: &str) -> String {
    format!("{}D", contest_id)
}

/// A problem as the contest API lists it
#[derive(Debug, Clone, PartialEq)]
pub struct ContestProblem {
    /// Judge code ("FLOW001"), used in API and page URLs
    pub code: String,
    pub name: String,
}

impl ContestProblem {
    /// Summary keyed by the lowercased code
    pub fn summary(&self) -> ProblemSummary {
        ProblemSummary::new(self.code.to_lowercase(), self.name.clone())
    }
}

/// Problems of a `/api/contests/{id}` payload
pub fn parse_contest_problems(data: &Value) -> Vec<ContestProblem> {
    let Some(problems) = data.get("problems").and_then(Value::as_object) else {
        return Vec::new();
    };

    problems
        .iter()
        .map(|(code, problem)| {
            let name = problem
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or(code.as_str());
            ContestProblem {
                code: code.clone(),
                name: name.to_string(),
            }
        })
        .collect()
}

/// Every Starters round up to the newest one listed, named where known
pub fn parse_starters(data: &Value) -> Vec<ContestSummary> {
    let starters_re = STARTERS_RE.get_or_init(|| Regex::new(r"^START(\d+)").unwrap());

    let listed = ["future_contests", "past_contests"]
        .iter()
        .filter_map(|key| data.get(*key).and_then(Value::as_array))
        .flatten();

    let mut max_number = 0u32;
    let mut names: HashMap<String, String> = HashMap::new();
    for contest in listed {
        let code = contest
            .get("contest_code")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let Some(number) = starters_re
            .captures(code)
            .and_then(|caps| caps[1].parse::<u32>().ok())
        else {
            continue;
        };
        max_number = max_number.max(number);
        let name = contest
            .get("contest_name")
            .and_then(Value::as_str)
            .unwrap_or(code);
        names.insert(code.to_string(), name.to_string());
    }

    (1..=max_number)
        .map(|n| {
            let id = format!("START{}", n);
            let name = names
                .get(&id)
                .cloned()
                .unwrap_or_else(|| format!("Starters {}", n));
            ContestSummary::new(id, name)
        })
        .collect()
}

/// Sample cases and time limit (ms) of a `/api/contests/{id}/problems/{code}`
/// payload
pub fn parse_problem(data: &Value) -> (Vec<TestCase>, u64) {
    let tests = data
        .pointer("/problemComponents/sampleTestCases")
        .and_then(Value::as_array)
        .map(|cases| {
            cases
                .iter()
                .filter(|case| !case.get("isDeleted").and_then(Value::as_bool).unwrap_or(false))
                .map(|case| {
                    let field = |name: &str| case.get(name).and_then(Value::as_str).unwrap_or_default();
                    TestCase::new(field("input"), field("output"))
                })
                .collect()
        })
        .unwrap_or_default();

    let secs = match data.get("max_timelimit") {
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(Value::Number(n)) => n.as_f64(),
        _ => None,
    }
    .unwrap_or(DEFAULT_TIME_LIMIT_SECS);

    (tests, (secs * 1000.0).round() as u64)
}

/// Memory limit stated on a problem page
pub fn parse_memory_limit(html: &str) -> Option<f64> {
    let re = MEMORY_LIMIT_RE
        .get_or_init(|| Regex::new(r"(?i)Memory\s+Limit[:\s]+([0-9.]+)\s*MB").unwrap());
    re.captures(html).and_then(|caps| caps[1].parse::<f64>().ok())
}

#[derive(Debug, Clone)]
struct ProblemJob {
    id: String,
    code: String,
    api_url: String,
    page_url: String,
}

/// CodeChef adapter
#[derive(Debug)]
pub struct CodeChef {
    engine: Arc<FetchEngine>,
    base_url: String,
    api_concurrency: usize,
}

impl CodeChef {
    pub fn new(config: &ScraperConfig) -> Result<Self, FetchError> {
        Ok(Self {
            engine: Arc::new(FetchEngine::new(config)?),
            base_url: config.base_url(NAME, DEFAULT_BASE_URL),
            api_concurrency: config.api_concurrency,
        })
    }

    async fn fetch_contest(&self, contest_id: &str) -> Result<Value, FetchError> {
        let url = format!("{}/api/contests/{}", self.base_url, div4_id(contest_id));
        self.engine.get_json(&url).await
    }
}

/// Fetch one problem: samples and time limit from the API, memory limit from
/// the problem page
async fn fetch_problem(engine: &FetchEngine, job: &ProblemJob) -> Result<TestsResult, FetchError> {
    let data: Value = engine.get_json(&job.api_url).await?;
    let (tests, timeout_ms) = parse_problem(&data);

    let memory_mb = match engine.get_text(&job.page_url).await {
        Ok(html) => parse_memory_limit(&html).unwrap_or(DEFAULT_MEMORY_MB),
        Err(e) => {
            debug!("Memory limit unavailable for {}: {}", job.code, e);
            DEFAULT_MEMORY_MB
        }
    };

    Ok(TestsResult::new(job.id.clone(), job.page_url.clone())
        .with_tests(tests)
        .with_limits(timeout_ms, memory_mb))
}

pub fn create(config: &ScraperConfig) -> Result<Arc<dyn Platform>, FetchError> {
    Ok(Arc::new(CodeChef::new(config)?))
}

#[async_trait]
impl Platform for CodeChef {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn fetch_metadata(&self, contest_id: &str) -> ScrapeResult<MetadataResult> {
        let data = match self.fetch_contest(contest_id).await {
            Ok(data) => data,
            Err(e) => {
                return Ok(MetadataResult::failure(
                    NAME,
                    format!("Failed to fetch contest {}: {}", contest_id, e),
                    contest_id,
                ))
            }
        };

        Ok(MetadataResult::from_problems(
            NAME,
            contest_id,
            parse_contest_problems(&data)
                .iter()
                .map(ContestProblem::summary)
                .collect(),
            format!("{}/problems/%s", self.base_url),
        ))
    }

    async fn fetch_contest_list(&self) -> ScrapeResult<ContestListResult> {
        let url = format!("{}/api/list/contests/all", self.base_url);
        let data: Value = match self.engine.get_json(&url).await {
            Ok(data) => data,
            Err(e) => {
                return Ok(ContestListResult::failure(
                    NAME,
                    format!("Failed to fetch contests: {}", e),
                ))
            }
        };

        let contests = parse_starters(&data);
        if contests.is_empty() {
            return Ok(ContestListResult::failure(NAME, "No Starters contests found"));
        }
        Ok(ContestListResult::from_contests(NAME, contests))
    }

    async fn stream_tests(&self, category_id: &str) -> ScrapeResult<JobStream<TestsResult>> {
        let data = self.fetch_contest(category_id).await?;
        let div4 = div4_id(category_id);

        let jobs: Vec<ProblemJob> = parse_contest_problems(&data)
            .into_iter()
            .map(|problem| ProblemJob {
                id: problem.code.to_lowercase(),
                api_url: format!("{}/api/contests/{}/problems/{}", self.base_url, div4, problem.code),
                page_url: format!("{}/problems/{}", self.base_url, problem.code),
                code: problem.code,
            })
            .collect();

        if jobs.is_empty() {
            return Err(ScrapeError::NotFound(format!(
                "No problems found for contest {}",
                category_id
            )));
        }

        let engine = Arc::clone(&self.engine);
        Ok(fanout::spawn(
            jobs,
            self.api_concurrency,
            move |job: ProblemJob| {
                let engine = Arc::clone(&engine);
                async move { fetch_problem(&engine, &job).await }
            },
            |job: &ProblemJob, error: String| {
                TestsResult::failure(NAME, error, &job.id, &job.page_url)
            },
        ))
    }

    fn stats(&self) -> Option<FetchStats> {
        Some(self.engine.stats())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_div4_id() {
        assert_eq!(div4_id("START120"), "START120D");
    }

    #[test]
    fn test_parse_contest_problems() {
        let data = json!({
            "status": "success",
            "problems": {
                "FLOW001": {"code": "FLOW001", "name": "Add Two Numbers"},
                "NONAME": {"code": "NONAME"}
            }
        });

        let problems = parse_contest_problems(&data);
        assert_eq!(problems[0].code, "FLOW001");
        assert_eq!(
            problems.iter().map(ContestProblem::summary).collect::<Vec<_>>(),
            vec![
                ProblemSummary::new("flow001", "Add Two Numbers"),
                ProblemSummary::new("noname", "NONAME"),
            ]
        );
        assert!(parse_contest_problems(&json!({"problems": []})).is_empty());
        assert!(parse_contest_problems(&json!({"status": "error"})).is_empty());
    }

    #[test]
    fn test_parse_starters_fills_gaps() {
        let data = json!({
            "future_contests": [{"contest_code": "START4", "contest_name": "Starters 4 (Rated)"}],
            "past_contests": [
                {"contest_code": "START2", "contest_name": "CodeChef Starters 2"},
                {"contest_code": "COOK140", "contest_name": "Cook-Off"}
            ]
        });

        let contests = parse_starters(&data);
        assert_eq!(contests.len(), 4);
        assert_eq!(contests[0], ContestSummary::new("START1", "Starters 1"));
        assert_eq!(contests[1], ContestSummary::new("START2", "CodeChef Starters 2"));
        assert_eq!(contests[3], ContestSummary::new("START4", "Starters 4 (Rated)"));

        assert!(parse_starters(&json!({"past_contests": []})).is_empty());
    }

    #[test]
    fn test_parse_problem() {
        let data = json!({
            "max_timelimit": "1.5",
            "problemComponents": {
                "sampleTestCases": [
                    {"input": "2\r\n1 2\r\n", "output": "3\n", "isDeleted": false},
                    {"input": "old", "output": "old", "isDeleted": true},
                    {"input": "1\n5", "output": "5"}
                ]
            }
        });

        let (tests, timeout_ms) = parse_problem(&data);
        assert_eq!(timeout_ms, 1500);
        assert_eq!(
            tests,
            vec![TestCase::new("2\n1 2", "3"), TestCase::new("1\n5", "5")]
        );

        let (tests, timeout_ms) = parse_problem(&json!({"max_timelimit": 2}));
        assert!(tests.is_empty());
        assert_eq!(timeout_ms, 2000);

        assert_eq!(parse_problem(&json!({})).1, 1000);
    }

    #[test]
    fn test_parse_memory_limit() {
        assert_eq!(parse_memory_limit("<div>Memory Limit: 512 MB</div>"), Some(512.0));
        assert_eq!(parse_memory_limit("memory limit 1.5MB"), Some(1.5));
        assert_eq!(parse_memory_limit("<div>nothing</div>"), None);
    }
}
