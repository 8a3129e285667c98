//! Codeforces adapter
//!
//! Every problem of a contest is on one `/contest/{id}/problems` page, so
//! metadata and tests come from a single fetch; the contest list comes from
//! the public JSON API.
//!
//! Multi-test samples are published with every line tagged
//! `test-example-line-N`. When that markup is present each group N >= 1
//! becomes its own test case (group 0 is the case-count line) and the whole
//! sample is kept as the `combined` view, the input a judge would feed in
//! one run.

use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use crate::config::ScraperConfig;
use crate::scraping::contract::{Platform, ScrapeError, ScrapeResult};
use crate::scraping::fanout::JobStream;
use crate::scraping::fetcher::{FetchEngine, FetchError, FetchStats};
use crate::scraping::text::{pre_text, select_all, select_first, squashed_text};
use crate::types::{
    normalize_sample, CombinedTest, ContestListResult, ContestSummary, MetadataResult,
    ProblemSummary, TestCase, TestsResult,
};

pub const NAME: &str = "codeforces";
pub const DEFAULT_BASE_URL: &str = "https://codeforces.com";

static TIME_LIMIT_RE: OnceLock<Regex> = OnceLock::new();
static MEMORY_LIMIT_RE: OnceLock<Regex> = OnceLock::new();
static EXAMPLE_LINE_RE: OnceLock<Regex> = OnceLock::new();

/// Everything one problem block of the problems page yields
#[derive(Debug, Clone, PartialEq)]
pub struct ProblemBlock {
    /// Index as published ("A", "B1")
    pub letter: String,
    pub name: String,
    pub tests: Vec<TestCase>,
    pub combined: Option<CombinedTest>,
    pub timeout_ms: u64,
    pub memory_mb: f64,
    pub interactive: bool,
}

/// Samples of one `div.sample-test`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Samples {
    pub tests: Vec<TestCase>,
    pub combined: Option<CombinedTest>,
}

/// Every problem block of a `/contest/{id}/problems` page
pub fn parse_problems_page(html: &str) -> Vec<ProblemBlock> {
    let document = Html::parse_document(html);

    let mut blocks = Vec::new();
    for holder in select_all(document.root_element(), "div.problemindexholder[problemindex]") {
        let letter = holder
            .value()
            .attr("problemindex")
            .unwrap_or_default()
            .trim()
            .to_uppercase();
        if letter.is_empty() {
            continue;
        }
        let Some(statement) = select_first(holder, "div.problem-statement") else {
            continue;
        };

        let (timeout_ms, memory_mb) = parse_limits(statement);
        let samples = parse_samples(statement);
        blocks.push(ProblemBlock {
            letter,
            name: parse_title(statement),
            tests: samples.tests,
            combined: samples.combined,
            timeout_ms,
            memory_mb,
            interactive: squashed_text(statement).contains("This is an interactive problem"),
        });
    }
    blocks
}

/// Problem name from the "A. Name" title
fn parse_title(statement: ElementRef<'_>) -> String {
    let Some(title) = select_first(statement, "div.title") else {
        return String::new();
    };
    let text = squashed_text(title);
    match text.split_once('.') {
        Some((_, name)) => name.trim().to_string(),
        None => text,
    }
}

fn parse_limits(statement: ElementRef<'_>) -> (u64, f64) {
    let time_re = TIME_LIMIT_RE.get_or_init(|| Regex::new(r"([\d.]+)\s*seconds?").unwrap());
    let memory_re = MEMORY_LIMIT_RE.get_or_init(|| Regex::new(r"(\d+)\s*megabytes?").unwrap());

    let timeout_ms = select_first(statement, "div.time-limit")
        .map(squashed_text)
        .and_then(|text| {
            time_re
                .captures(&text)
                .and_then(|caps| caps[1].parse::<f64>().ok())
        })
        .map(|secs| (secs * 1000.0).round() as u64)
        .unwrap_or(0);
    let memory_mb = select_first(statement, "div.memory-limit")
        .map(squashed_text)
        .and_then(|text| {
            memory_re
                .captures(&text)
                .and_then(|caps| caps[1].parse::<f64>().ok())
        })
        .unwrap_or(0.0);

    (timeout_ms, memory_mb)
}

/// Group tagged sample lines by their `test-example-line-N` number
fn group_lines(pres: &[ElementRef<'_>]) -> BTreeMap<u32, Vec<String>> {
    let line_re = EXAMPLE_LINE_RE
        .get_or_init(|| Regex::new(r"\btest-example-line-(\d+)\b").unwrap());

    let mut groups: BTreeMap<u32, Vec<String>> = BTreeMap::new();
    for pre in pres {
        for line in select_all(*pre, "div.test-example-line") {
            let classes = line.value().classes().collect::<Vec<_>>().join(" ");
            let Some(group) = line_re
                .captures(&classes)
                .and_then(|caps| caps[1].parse::<u32>().ok())
            else {
                continue;
            };
            groups
                .entry(group)
                .or_default()
                .push(line.text().collect::<String>());
        }
    }
    groups
}

/// Sample cases of a problem statement
pub fn parse_samples(statement: ElementRef<'_>) -> Samples {
    let Some(sample_test) = select_first(statement, "div.sample-test") else {
        return Samples::default();
    };

    let input_pres: Vec<ElementRef<'_>> = select_all(sample_test, "div.input")
        .into_iter()
        .filter_map(|div| select_first(div, "pre"))
        .collect();
    let output_pres: Vec<ElementRef<'_>> = select_all(sample_test, "div.output")
        .into_iter()
        .filter_map(|div| select_first(div, "pre"))
        .collect();

    let inputs: Vec<String> = input_pres.iter().map(|pre| pre_text(*pre)).collect();
    let outputs: Vec<String> = output_pres.iter().map(|pre| pre_text(*pre)).collect();

    let grouped = input_pres
        .iter()
        .chain(output_pres.iter())
        .any(|pre| select_first(*pre, "div.test-example-line").is_some());

    if grouped {
        let mut input_groups = group_lines(&input_pres);
        let mut output_groups = group_lines(&output_pres);
        input_groups.remove(&0);
        output_groups.remove(&0);

        let tests: Vec<TestCase> = input_groups
            .iter()
            .filter_map(|(group, lines)| {
                output_groups
                    .get(group)
                    .map(|expected| TestCase::new(&lines.join("\n"), &expected.join("\n")))
            })
            .collect();

        if !tests.is_empty() {
            return Samples {
                tests,
                combined: Some(CombinedTest {
                    input: normalize_sample(&inputs.join("\n")),
                    expected: normalize_sample(&outputs.join("\n")),
                }),
            };
        }
    }

    Samples {
        tests: inputs
            .iter()
            .zip(outputs.iter())
            .map(|(input, expected)| TestCase::new(input, expected))
            .collect(),
        combined: None,
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    result: Vec<ApiContest>,
}

#[derive(Debug, Deserialize)]
struct ApiContest {
    id: i64,
    name: String,
    phase: String,
}

/// Codeforces adapter
#[derive(Debug)]
pub struct Codeforces {
    engine: FetchEngine,
    base_url: String,
}

impl Codeforces {
    pub fn new(config: &ScraperConfig) -> Result<Self, FetchError> {
        Ok(Self {
            engine: FetchEngine::new(config)?,
            base_url: config.base_url(NAME, DEFAULT_BASE_URL),
        })
    }

    async fn fetch_blocks(&self, contest_id: &str) -> ScrapeResult<Vec<ProblemBlock>> {
        let url = format!("{}/contest/{}/problems", self.base_url, contest_id);
        let not_found = || ScrapeError::NotFound(format!("No problems found for contest {}", contest_id));

        let html = match self.engine.get_text(&url).await {
            Ok(html) => html,
            Err(e) if e.is_not_found() => return Err(not_found()),
            Err(e) => return Err(e.into()),
        };

        let blocks = parse_problems_page(&html);
        if blocks.is_empty() {
            return Err(not_found());
        }
        Ok(blocks)
    }
}

pub fn create(config: &ScraperConfig) -> Result<Arc<dyn Platform>, FetchError> {
    Ok(Arc::new(Codeforces::new(config)?))
}

#[async_trait]
impl Platform for Codeforces {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn fetch_metadata(&self, contest_id: &str) -> ScrapeResult<MetadataResult> {
        let blocks = match self.fetch_blocks(contest_id).await {
            Ok(blocks) => blocks,
            Err(ScrapeError::NotFound(msg)) => {
                return Ok(MetadataResult::failure(NAME, msg, contest_id))
            }
            Err(e) => return Err(e),
        };

        let problems = blocks
            .into_iter()
            .map(|block| ProblemSummary::new(block.letter.to_lowercase(), block.name))
            .collect();

        Ok(MetadataResult::from_problems(
            NAME,
            contest_id,
            problems,
            format!("{}/contest/{}/problem/%s", self.base_url, contest_id),
        ))
    }

    async fn fetch_contest_list(&self) -> ScrapeResult<ContestListResult> {
        let response: ApiResponse = self
            .engine
            .get_json(&format!("{}/api/contest.list", self.base_url))
            .await?;

        if response.status != "OK" {
            return Ok(ContestListResult::failure(NAME, "Invalid API response"));
        }

        let contests = response
            .result
            .into_iter()
            .filter(|c| c.phase == "FINISHED")
            .map(|c| ContestSummary::new(c.id.to_string(), c.name))
            .collect();

        Ok(ContestListResult::from_contests(NAME, contests))
    }

    async fn stream_tests(&self, category_id: &str) -> ScrapeResult<JobStream<TestsResult>> {
        let blocks = self.fetch_blocks(category_id).await?;

        let records = blocks
            .into_iter()
            .map(|block| {
                let url = format!(
                    "{}/contest/{}/problem/{}",
                    self.base_url, category_id, block.letter
                );
                TestsResult::new(block.letter.to_lowercase(), url)
                    .with_tests(block.tests)
                    .with_limits(block.timeout_ms, block.memory_mb)
                    .with_interactive(block.interactive)
                    .with_combined(block.combined)
            })
            .collect();

        Ok(JobStream::ready(records))
    }

    fn stats(&self) -> Option<FetchStats> {
        Some(self.engine.stats())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROBLEMS_HTML: &str = r#"
<html><body>
<div class="problemindexholder" problemindex="A">
  <div class="ttypography"><div class="problem-statement">
    <div class="header">
      <div class="title">A. Watermelon</div>
      <div class="time-limit"><div class="property-title">time limit per test</div>1 second</div>
      <div class="memory-limit"><div class="property-title">memory limit per test</div>64 megabytes</div>
    </div>
    <div><p>Split the watermelon.</p></div>
    <div class="sample-tests"><div class="sample-test">
      <div class="input"><div class="title">Input</div><pre>8
</pre></div>
      <div class="output"><div class="title">Output</div><pre>YES
</pre></div>
    </div></div>
  </div></div>
</div>
<div class="problemindexholder" problemindex="B">
  <div class="ttypography"><div class="problem-statement">
    <div class="header">
      <div class="title">B. Sum of Pairs</div>
      <div class="time-limit"><div class="property-title">time limit per test</div>2.5 seconds</div>
      <div class="memory-limit"><div class="property-title">memory limit per test</div>256 megabytes</div>
    </div>
    <div class="sample-tests"><div class="sample-test">
      <div class="input"><div class="title">Input</div><pre><div class="test-example-line test-example-line-even test-example-line-0">2</div><div class="test-example-line test-example-line-odd test-example-line-1">2</div><div class="test-example-line test-example-line-odd test-example-line-1">1 2</div><div class="test-example-line test-example-line-even test-example-line-2">1</div><div class="test-example-line test-example-line-even test-example-line-2">7</div></pre></div>
      <div class="output"><div class="title">Output</div><pre><div class="test-example-line test-example-line-odd test-example-line-1">3</div><div class="test-example-line test-example-line-even test-example-line-2">7</div></pre></div>
    </div></div>
  </div></div>
</div>
<div class="problemindexholder" problemindex="C">
  <div class="ttypography"><div class="problem-statement">
    <div class="header"><div class="title">C. Guess</div></div>
    <div><p>This is an interactive problem.</p></div>
    <div class="sample-tests"><div class="sample-test">
      <div class="input"><div class="title">Input</div><pre>1<br>2<br></pre></div>
      <div class="output"><div class="title">Output</div><pre>? 1<br>! 2</pre></div>
    </div></div>
  </div></div>
</div>
</body></html>"#;

    #[test]
    fn test_parse_problem_blocks() {
        let blocks = parse_problems_page(PROBLEMS_HTML);
        assert_eq!(blocks.len(), 3);

        let a = &blocks[0];
        assert_eq!(a.letter, "A");
        assert_eq!(a.name, "Watermelon");
        assert_eq!(a.timeout_ms, 1000);
        assert_eq!(a.memory_mb, 64.0);
        assert_eq!(a.tests, vec![TestCase::new("8", "YES")]);
        assert!(a.combined.is_none());
        assert!(!a.interactive);
    }

    #[test]
    fn test_grouped_samples_split_into_cases() {
        let blocks = parse_problems_page(PROBLEMS_HTML);
        let b = &blocks[1];

        assert_eq!(b.timeout_ms, 2500);
        assert_eq!(b.memory_mb, 256.0);
        assert_eq!(
            b.tests,
            vec![TestCase::new("2\n1 2", "3"), TestCase::new("1\n7", "7")]
        );
        assert_eq!(
            b.combined,
            Some(CombinedTest {
                input: "2\n2\n1 2\n1\n7".to_string(),
                expected: "3\n7".to_string(),
            })
        );
    }

    #[test]
    fn test_br_samples_and_interactive_flag() {
        let blocks = parse_problems_page(PROBLEMS_HTML);
        let c = &blocks[2];

        assert!(c.interactive);
        assert_eq!(c.tests, vec![TestCase::new("1\n2", "? 1\n! 2")]);
        assert_eq!(c.timeout_ms, 0);
    }

    #[test]
    fn test_page_without_blocks() {
        assert!(parse_problems_page("<html><body>Contest not found</body></html>").is_empty());
    }

    #[test]
    fn test_api_response_shape() {
        let body = r#"{"status":"OK","result":[
            {"id":1920,"name":"Round 919","type":"CF","phase":"FINISHED"},
            {"id":1999,"name":"Upcoming","type":"CF","phase":"BEFORE"}]}"#;
        let response: ApiResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.status, "OK");
        assert_eq!(response.result.len(), 2);

        let failed: ApiResponse =
            serde_json::from_str(r#"{"status":"FAILED","comment":"limit"}"#).unwrap();
        assert!(failed.result.is_empty());
    }
}
