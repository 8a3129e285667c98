//! CSES adapter
//!
//! The problem set has categories instead of contests. Everything is read
//! with regular expressions over the raw markup, which is small and stable.

use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, OnceLock};

use crate::config::ScraperConfig;
use crate::scraping::contract::{Platform, ScrapeError, ScrapeResult};
use crate::scraping::fanout::{self, JobStream};
use crate::scraping::fetcher::{FetchEngine, FetchError, FetchStats};
use crate::scraping::text::decode_entities;
use crate::types::{
    ContestListResult, ContestSummary, MetadataResult, ProblemSummary, TestCase, TestsResult,
};

pub const NAME: &str = "cses";
pub const DEFAULT_BASE_URL: &str = "https://cses.fi";

const INDEX_PATH: &str = "/problemset/list";

/// Words kept lowercase inside a title
const SMALL_WORDS: &[&str] = &[
    "a", "an", "the", "and", "but", "or", "nor", "for", "so", "yet", "at", "by", "in", "of",
    "on", "per", "to", "vs", "via",
];

static CATEGORY_BLOCK_RE: OnceLock<Regex> = OnceLock::new();
static TASK_LINK_RE: OnceLock<Regex> = OnceLock::new();
static TIME_RE: OnceLock<Regex> = OnceLock::new();
static MEMORY_RE: OnceLock<Regex> = OnceLock::new();
static MD_BLOCK_RE: OnceLock<Regex> = OnceLock::new();
static EXAMPLE_HEADER_RE: OnceLock<Regex> = OnceLock::new();
static ANY_HEADER_RE: OnceLock<Regex> = OnceLock::new();
static LABELED_IO_RE: OnceLock<Regex> = OnceLock::new();
static PRE_RE: OnceLock<Regex> = OnceLock::new();

fn category_block_re() -> &'static Regex {
    CATEGORY_BLOCK_RE.get_or_init(|| {
        Regex::new(r#"(?s)<h2>(?P<cat>[^<]+)</h2>\s*<ul class="task-list">(?P<body>.*?)</ul>"#)
            .unwrap()
    })
}

/// "Sorting and Searching" -> "sorting_and_searching"
pub fn normalize_category_name(name: &str) -> String {
    name.to_lowercase().replace(' ', "_").replace('&', "and")
}

/// "sorting_and_searching" -> "Sorting and Searching"
pub fn snake_to_title(id: &str) -> String {
    let words: Vec<&str> = id.split('_').collect();
    let last = words.len().saturating_sub(1);

    words
        .iter()
        .enumerate()
        .map(|(i, word)| {
            let lower = word.to_lowercase();
            if i != 0 && i != last && SMALL_WORDS.contains(&lower.as_str()) {
                lower
            } else {
                capitalize(&lower)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Every category of the problem set index except "General"
pub fn parse_categories(html: &str) -> Vec<ContestSummary> {
    category_block_re()
        .captures_iter(html)
        .map(|caps| decode_entities(caps["cat"].trim()))
        .filter(|name| name != "General")
        .map(|name| ContestSummary::new(normalize_category_name(&name), name))
        .collect()
}

/// Tasks of the category whose title matches `category_id`
pub fn parse_category_problems(category_id: &str, html: &str) -> Vec<ProblemSummary> {
    let wanted = snake_to_title(category_id);
    let task_re = TASK_LINK_RE.get_or_init(|| {
        Regex::new(
            r#"(?s)<li class="task"><a href="/problemset/task/(?P<id>\d+)/?">(?P<title>[^<]+)</a>"#,
        )
        .unwrap()
    });

    category_block_re()
        .captures_iter(html)
        .find(|caps| decode_entities(caps["cat"].trim()) == wanted)
        .map(|caps| {
            task_re
                .captures_iter(&caps["body"])
                .map(|task| {
                    ProblemSummary::new(&task["id"], decode_entities(task["title"].trim()))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Time limit (ms) and memory limit (MB) of a task page, 0 when absent
pub fn parse_limits(html: &str) -> (u64, f64) {
    let time_re = TIME_RE.get_or_init(|| {
        Regex::new(r"<li><b>Time limit:</b>\s*([0-9.]+)\s*s</li>").unwrap()
    });
    let memory_re = MEMORY_RE.get_or_init(|| {
        Regex::new(r"<li><b>Memory limit:</b>\s*(\d+)\s*MB</li>").unwrap()
    });

    let timeout_ms = time_re
        .captures(html)
        .and_then(|caps| caps[1].parse::<f64>().ok())
        .map(|secs| (secs * 1000.0).round() as u64)
        .unwrap_or(0);
    let memory_mb = memory_re
        .captures(html)
        .and_then(|caps| caps[1].parse::<f64>().ok())
        .unwrap_or(0.0);

    (timeout_ms, memory_mb)
}

/// The example of a task page.
///
/// Looks inside the statement's `div.md`, narrowed to the "Example" section
/// when there is one: a labelled `Input:`/`Output:` pair first, otherwise the
/// first two `<pre>` blocks.
pub fn parse_tests(html: &str) -> Vec<TestCase> {
    let md_re = MD_BLOCK_RE
        .get_or_init(|| Regex::new(r#"(?is)<div class="md">(.*?)</div>"#).unwrap());
    let example_re = EXAMPLE_HEADER_RE.get_or_init(|| {
        Regex::new(r"(?is)<h[1-6][^>]*>\s*examples?:?\s*</h[1-6]>\s*").unwrap()
    });
    let header_re = ANY_HEADER_RE.get_or_init(|| Regex::new(r"(?i)<h[1-6][^>]*>").unwrap());
    let labeled_re = LABELED_IO_RE.get_or_init(|| {
        Regex::new(
            r"(?is)input\s*:\s*</p>\s*<pre>(?P<input>.*?)</pre>.*?output\s*:\s*</p>\s*<pre>(?P<output>.*?)</pre>",
        )
        .unwrap()
    });
    let pre_re = PRE_RE.get_or_init(|| Regex::new(r"(?is)<pre>(.*?)</pre>").unwrap());

    let Some(md) = md_re.captures(html) else {
        return Vec::new();
    };
    let block = md.get(1).map_or("", |m| m.as_str());

    let section = match example_re.find(block) {
        Some(header) => {
            let rest = &block[header.end()..];
            match header_re.find(rest) {
                Some(next) => &rest[..next.start()],
                None => rest,
            }
        }
        None => block,
    };

    if let Some(caps) = labeled_re.captures(section) {
        return vec![TestCase::new(
            &decode_entities(&caps["input"]),
            &decode_entities(&caps["output"]),
        )];
    }

    let pres: Vec<&str> = pre_re
        .captures_iter(section)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect();
    if pres.len() >= 2 {
        return vec![TestCase::new(
            &decode_entities(pres[0]),
            &decode_entities(pres[1]),
        )];
    }

    Vec::new()
}

/// Record for one task page
fn task_result(problem_id: String, url: String, html: &str) -> TestsResult {
    let tests = parse_tests(html);
    if tests.is_empty() {
        return TestsResult::failure(NAME, "no tests found", &problem_id, &url);
    }

    let (timeout_ms, memory_mb) = parse_limits(html);
    TestsResult::new(problem_id, url)
        .with_tests(tests)
        .with_limits(timeout_ms, memory_mb)
}

#[derive(Debug, Clone)]
struct TaskJob {
    problem_id: String,
    url: String,
}

/// CSES adapter
#[derive(Debug)]
pub struct Cses {
    engine: Arc<FetchEngine>,
    base_url: String,
    max_concurrency: usize,
}

impl Cses {
    pub fn new(config: &ScraperConfig) -> Result<Self, FetchError> {
        Ok(Self {
            engine: Arc::new(FetchEngine::new(config)?),
            base_url: config.base_url(NAME, DEFAULT_BASE_URL),
            max_concurrency: config.max_concurrency,
        })
    }

    async fn fetch_index(&self) -> Result<String, FetchError> {
        self.engine
            .get_text(&format!("{}{}", self.base_url, INDEX_PATH))
            .await
    }

    fn task_url(&self, problem_id: &str) -> String {
        format!("{}/problemset/task/{}", self.base_url, problem_id)
    }
}

pub fn create(config: &ScraperConfig) -> Result<Arc<dyn Platform>, FetchError> {
    Ok(Arc::new(Cses::new(config)?))
}

#[async_trait]
impl Platform for Cses {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn fetch_metadata(&self, contest_id: &str) -> ScrapeResult<MetadataResult> {
        let html = self.fetch_index().await?;
        let problems = parse_category_problems(contest_id, &html);
        if problems.is_empty() {
            return Ok(MetadataResult::failure(
                NAME,
                format!("No problems found for category {}", contest_id),
                contest_id,
            ));
        }

        Ok(MetadataResult::from_problems(
            NAME,
            contest_id,
            problems,
            format!("{}/problemset/task/%s", self.base_url),
        ))
    }

    async fn fetch_contest_list(&self) -> ScrapeResult<ContestListResult> {
        let html = self.fetch_index().await?;
        Ok(ContestListResult::from_contests(NAME, parse_categories(&html)))
    }

    async fn stream_tests(&self, category_id: &str) -> ScrapeResult<JobStream<TestsResult>> {
        let html = self.fetch_index().await?;
        let jobs: Vec<TaskJob> = parse_category_problems(category_id, &html)
            .into_iter()
            .map(|problem| TaskJob {
                url: self.task_url(&problem.id),
                problem_id: problem.id,
            })
            .collect();

        if jobs.is_empty() {
            return Err(ScrapeError::NotFound(format!(
                "No problems found for category {}",
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
                    Ok::<_, FetchError>(task_result(job.problem_id, job.url, &html))
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

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX_HTML: &str = r#"<div class="content">
<h2>General</h2>
<ul class="task-list"><li class="link"><a href="/problemset/stats">Statistics</a></li></ul>
<h2>Introductory Problems</h2>
<ul class="task-list"><li class="task"><a href="/problemset/task/1068">Weird Algorithm</a><span class="detail">150000 / 160000</span></li><li class="task"><a href="/problemset/task/1083/">Missing Number</a></li></ul>
<h2>Sorting and Searching</h2>
<ul class="task-list"><li class="task"><a href="/problemset/task/1621">Distinct Numbers</a></li></ul>
</div>"#;

    const TASK_HTML: &str = r#"<div class="title-block"><h1>Weird Algorithm</h1></div>
<ul class="task-constraints"><li><b>Time limit:</b> 1.00 s</li><li><b>Memory limit:</b> 512 MB</li></ul>
<div class="md"><p>Consider an algorithm that takes as input a positive integer n.</p>
<h1 id="input">Input</h1><p>The only input line contains an integer n.</p>
<h1 id="example">Example</h1>
<p>Input:</p>
<pre>3
</pre>
<p>Output:</p>
<pre>3 10 5 16 8 4 2 1
</pre>
</div>"#;

    #[test]
    fn test_category_names() {
        assert_eq!(normalize_category_name("Sorting and Searching"), "sorting_and_searching");
        assert_eq!(normalize_category_name("Graph Algorithms"), "graph_algorithms");
        assert_eq!(normalize_category_name("Math & Geometry"), "math_and_geometry");

        assert_eq!(snake_to_title("sorting_and_searching"), "Sorting and Searching");
        assert_eq!(snake_to_title("introductory_problems"), "Introductory Problems");
        assert_eq!(snake_to_title("the_end_of"), "The End Of");
    }

    #[test]
    fn test_parse_categories_skips_general() {
        let categories = parse_categories(INDEX_HTML);
        assert_eq!(
            categories,
            vec![
                ContestSummary::new("introductory_problems", "Introductory Problems"),
                ContestSummary::new("sorting_and_searching", "Sorting and Searching"),
            ]
        );
    }

    #[test]
    fn test_parse_category_problems() {
        let problems = parse_category_problems("introductory_problems", INDEX_HTML);
        assert_eq!(
            problems,
            vec![
                ProblemSummary::new("1068", "Weird Algorithm"),
                ProblemSummary::new("1083", "Missing Number"),
            ]
        );
        assert!(parse_category_problems("dynamic_programming", INDEX_HTML).is_empty());
    }

    #[test]
    fn test_parse_limits() {
        assert_eq!(parse_limits(TASK_HTML), (1000, 512.0));
        assert_eq!(parse_limits("<p>none</p>"), (0, 0.0));
    }

    #[test]
    fn test_parse_labeled_example() {
        assert_eq!(
            parse_tests(TASK_HTML),
            vec![TestCase::new("3", "3 10 5 16 8 4 2 1")]
        );
    }

    #[test]
    fn test_parse_unlabeled_pres_with_entities() {
        let html = r#"<div class="md"><h2>Example</h2><pre>1 &lt; 2
</pre><pre>YES</pre><h2>Notes</h2><pre>ignored</pre></div>"#;
        assert_eq!(parse_tests(html), vec![TestCase::new("1 < 2", "YES")]);
    }

    #[test]
    fn test_missing_example_yields_failure_record() {
        let record = task_result(
            "1068".to_string(),
            "https://cses.fi/problemset/task/1068".to_string(),
            "<div class=\"md\"><p>no samples</p></div>",
        );
        assert!(!record.success);
        assert_eq!(record.error, "cses: no tests found");
        assert_eq!(record.problem_id, "1068");
    }

    #[test]
    fn test_task_result_success() {
        let record = task_result("1068".to_string(), String::new(), TASK_HTML);
        assert!(record.success);
        assert_eq!(record.timeout_ms, 1000);
        assert_eq!(record.memory_mb, 512.0);
        assert!(!record.interactive);
    }
}
