//! AtCoder adapter
//!
//! Contest task tables, the paginated contest archive and one task page per
//! problem, all plain HTML.

use async_trait::async_trait;
use regex::Regex;
use scraper::Html;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use tracing::debug;

use crate::config::ScraperConfig;
use crate::scraping::contract::{Platform, ScrapeError, ScrapeResult};
use crate::scraping::fanout::{self, JobStream};
use crate::scraping::fetcher::{FetchEngine, FetchError, FetchStats};
use crate::scraping::text::{pre_text, select_all, select_first, squashed_text};
use crate::types::{
    ContestListResult, ContestSummary, MetadataResult, ProblemSummary, TestCase, TestsResult,
};

pub const NAME: &str = "atcoder";
pub const DEFAULT_BASE_URL: &str = "https://atcoder.jp";

/// AtCoder publishes memory limits in MiB
const MIB_TO_MB: f64 = 1.048576;

static TASK_HREF_RE: OnceLock<Regex> = OnceLock::new();
static CONTEST_HREF_RE: OnceLock<Regex> = OnceLock::new();
static TIME_LIMIT_RE: OnceLock<Regex> = OnceLock::new();
static MEMORY_LIMIT_RE: OnceLock<Regex> = OnceLock::new();
static SAMPLE_INPUT_RE: OnceLock<Regex> = OnceLock::new();
static SAMPLE_OUTPUT_RE: OnceLock<Regex> = OnceLock::new();

/// One row of a contest's task table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRow {
    /// Letter as shown ("A")
    pub letter: String,
    pub title: String,
    /// Task page slug ("abc100_a")
    pub slug: String,
}

/// Limits and flags read from a task page
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaskInfo {
    pub timeout_ms: u64,
    pub memory_mb: f64,
    pub interactive: bool,
}

/// Rows of the task table on `/contests/{id}/tasks`
pub fn parse_tasks(html: &str) -> Vec<TaskRow> {
    let document = Html::parse_document(html);
    let Some(tbody) = select_first(document.root_element(), "table tbody") else {
        return Vec::new();
    };
    let href_re = TASK_HREF_RE
        .get_or_init(|| Regex::new(r"/contests/[^/]+/tasks/([^/?#]+)").unwrap());

    let mut rows = Vec::new();
    for tr in select_all(tbody, "tr") {
        let cells = select_all(tr, "td");
        if cells.len() < 2 {
            continue;
        }
        let letter = squashed_text(cells[0]);
        let Some(link) = select_first(cells[1], "a[href*='/tasks/']") else {
            continue;
        };
        let Some(slug) = link
            .value()
            .attr("href")
            .and_then(|href| href_re.captures(href))
            .map(|caps| caps[1].to_string())
        else {
            continue;
        };

        rows.push(TaskRow {
            letter,
            title: squashed_text(link),
            slug,
        });
    }
    rows
}

/// Highest page number linked from the archive pagination, 1 when absent
pub fn parse_last_page(html: &str) -> u32 {
    let document = Html::parse_document(html);
    let Some(nav) = select_first(document.root_element(), "ul.pagination") else {
        return 1;
    };
    select_all(nav, "a")
        .into_iter()
        .filter_map(|a| squashed_text(a).parse::<u32>().ok())
        .max()
        .unwrap_or(1)
}

/// Contests listed on one archive page
pub fn parse_archive(html: &str) -> Vec<ContestSummary> {
    let document = Html::parse_document(html);
    let root = document.root_element();
    let Some(tbody) = select_first(root, "table.table-default tbody")
        .or_else(|| select_first(root, "tbody"))
    else {
        return Vec::new();
    };
    let href_re =
        CONTEST_HREF_RE.get_or_init(|| Regex::new(r"/contests/([^/?#]+)").unwrap());

    let mut contests = Vec::new();
    for tr in select_all(tbody, "tr") {
        let Some(link) = select_first(tr, "a[href^='/contests/']") else {
            continue;
        };
        let Some(id) = link
            .value()
            .attr("href")
            .and_then(|href| href_re.captures(href))
            .map(|caps| caps[1].to_string())
        else {
            continue;
        };
        contests.push(ContestSummary::new(id, squashed_text(link)));
    }
    contests
}

/// Time/memory limits and the interactive flag of a task page
pub fn parse_task_info(html: &str) -> TaskInfo {
    let document = Html::parse_document(html);
    let root = document.root_element();
    let text = squashed_text(root);

    let time_re = TIME_LIMIT_RE
        .get_or_init(|| Regex::new(r"(?i)Time\s*Limit:\s*([\d.]+)\s*sec").unwrap());
    let memory_re = MEMORY_LIMIT_RE
        .get_or_init(|| Regex::new(r"(?i)Memory\s*Limit:\s*(\d+)\s*MiB").unwrap());

    let timeout_ms = time_re
        .captures(&text)
        .and_then(|caps| caps[1].parse::<f64>().ok())
        .map(|secs| (secs * 1000.0) as u64)
        .unwrap_or(0);
    let memory_mb = memory_re
        .captures(&text)
        .and_then(|caps| caps[1].parse::<f64>().ok())
        .map(|mib| mib * MIB_TO_MB)
        .unwrap_or(0.0);

    let statement = select_first(root, "#problem-statement")
        .map(squashed_text)
        .unwrap_or(text);

    TaskInfo {
        timeout_ms,
        memory_mb,
        interactive: statement.contains("This is an interactive"),
    }
}

/// Sample cases of a task page.
///
/// Each `Sample Input N` / `Sample Output N` header claims the next `<pre>`;
/// inputs and outputs are paired by N, in ascending order.
pub fn parse_samples(html: &str) -> Vec<TestCase> {
    let document = Html::parse_document(html);
    let root = select_first(document.root_element(), "#task-statement")
        .unwrap_or_else(|| document.root_element());

    let input_re = SAMPLE_INPUT_RE
        .get_or_init(|| Regex::new(r"(?i)Sample\s*Input\s*(\d+)").unwrap());
    let output_re = SAMPLE_OUTPUT_RE
        .get_or_init(|| Regex::new(r"(?i)Sample\s*Output\s*(\d+)").unwrap());

    let mut inputs: BTreeMap<u32, String> = BTreeMap::new();
    let mut outputs: BTreeMap<u32, String> = BTreeMap::new();
    let mut pending_title: Option<String> = None;

    for element in select_all(root, "h2, h3, h4, pre") {
        if element.value().name() != "pre" {
            pending_title = Some(squashed_text(element));
            continue;
        }
        let Some(title) = pending_title.take() else {
            continue;
        };

        let number = |re: &Regex| {
            re.captures(&title)
                .and_then(|caps| caps[1].parse::<u32>().ok())
        };
        if let Some(n) = number(input_re) {
            inputs.insert(n, pre_text(element));
        } else if let Some(n) = number(output_re) {
            outputs.insert(n, pre_text(element));
        }
    }

    inputs
        .into_iter()
        .filter_map(|(n, input)| {
            outputs
                .get(&n)
                .map(|expected| TestCase::new(&input, expected))
        })
        .collect()
}

/// Problem summaries from task rows; ids are the lowercase letters
fn to_problems(rows: &[TaskRow]) -> Vec<ProblemSummary> {
    rows.iter()
        .filter(|row| !row.letter.is_empty())
        .map(|row| ProblemSummary::new(row.letter.to_lowercase(), row.title.clone()))
        .collect()
}

/// One per-problem fetch job
#[derive(Debug, Clone)]
struct TaskJob {
    problem_id: String,
    url: String,
}

/// AtCoder adapter
#[derive(Debug)]
pub struct AtCoder {
    engine: Arc<FetchEngine>,
    base_url: String,
    max_concurrency: usize,
}

impl AtCoder {
    pub fn new(config: &ScraperConfig) -> Result<Self, FetchError> {
        Ok(Self {
            engine: Arc::new(FetchEngine::new(config)?),
            base_url: config.base_url(NAME, DEFAULT_BASE_URL),
            max_concurrency: config.max_concurrency,
        })
    }

    /// Task rows of a contest; a missing contest is `NotFound`
    async fn fetch_tasks(&self, contest_id: &str) -> ScrapeResult<Vec<TaskRow>> {
        let url = format!("{}/contests/{}/tasks", self.base_url, contest_id);
        match self.engine.get_text(&url).await {
            Ok(html) => Ok(parse_tasks(&html)),
            Err(e) if e.is_not_found() => Err(ScrapeError::NotFound(format!(
                "No problems found for contest {}",
                contest_id
            ))),
            Err(e) => Err(e.into()),
        }
    }
}

pub fn create(config: &ScraperConfig) -> Result<Arc<dyn Platform>, FetchError> {
    Ok(Arc::new(AtCoder::new(config)?))
}

#[async_trait]
impl Platform for AtCoder {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn fetch_metadata(&self, contest_id: &str) -> ScrapeResult<MetadataResult> {
        let rows = match self.fetch_tasks(contest_id).await {
            Ok(rows) => rows,
            Err(ScrapeError::NotFound(msg)) => {
                return Ok(MetadataResult::failure(NAME, msg, contest_id))
            }
            Err(e) => return Err(e),
        };

        Ok(MetadataResult::from_problems(
            NAME,
            contest_id,
            to_problems(&rows),
            format!(
                "{}/contests/{}/tasks/{}_%s",
                self.base_url, contest_id, contest_id
            ),
        ))
    }

    async fn fetch_contest_list(&self) -> ScrapeResult<ContestListResult> {
        let archive_url = format!("{}/contests/archive", self.base_url);
        let first = self.engine.get_text(&archive_url).await?;
        let last_page = parse_last_page(&first);
        let mut contests = parse_archive(&first);
        debug!("AtCoder archive has {} pages", last_page);

        if last_page > 1 {
            let engine = Arc::clone(&self.engine);
            let pages = fanout::collect_ordered(
                (2..=last_page).collect(),
                self.max_concurrency,
                move |page: u32| {
                    let engine = Arc::clone(&engine);
                    let url = format!("{}?page={}", archive_url, page);
                    async move { engine.get_text(&url).await.map(|html| parse_archive(&html)) }
                },
            )
            .await;

            for (index, page) in pages.into_iter().enumerate() {
                match page {
                    Ok(page_contests) => contests.extend(page_contests),
                    Err(e) => {
                        return Err(ScrapeError::Other(anyhow::anyhow!(
                            "Failed to fetch archive page {}: {}",
                            index + 2,
                            e
                        )))
                    }
                }
            }
        }

        Ok(ContestListResult::from_contests(NAME, contests))
    }

    async fn stream_tests(&self, category_id: &str) -> ScrapeResult<JobStream<TestsResult>> {
        let rows = self.fetch_tasks(category_id).await?;
        let jobs: Vec<TaskJob> = rows
            .iter()
            .filter(|row| !row.letter.is_empty())
            .map(|row| TaskJob {
                problem_id: row.letter.to_lowercase(),
                url: format!("{}/contests/{}/tasks/{}", self.base_url, category_id, row.slug),
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
            self.max_concurrency,
            move |job: TaskJob| {
                let engine = Arc::clone(&engine);
                async move {
                    let html = engine.get_text(&job.url).await?;
                    let info = parse_task_info(&html);
                    Ok::<_, FetchError>(
                        TestsResult::new(job.problem_id, job.url)
                            .with_tests(parse_samples(&html))
                            .with_limits(info.timeout_ms, info.memory_mb)
                            .with_interactive(info.interactive),
                    )
                }
            },
            |job: &TaskJob, error: String| {
                TestsResult::failure(NAME, error, &job.problem_id, &job.url)
            },
        ))
    }

    fn stats(&self) -> Option<FetchStats> {
        Some(self.engine.stats())
    }
}
