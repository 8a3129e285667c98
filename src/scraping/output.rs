//! Newline-delimited JSON output
//!
//! One record per line, flushed as soon as it is written so a consumer reading
//! line by line sees each problem the moment its job finishes.

use serde::Serialize;
use std::io::{self, Write};
use std::time::Duration;
use tracing::{debug, warn};

use super::fanout::JobStream;
use crate::types::TestsResult;

/// Serialize `record` as one compact JSON line and flush
pub fn write_record<W: Write, T: Serialize>(out: &mut W, record: &T) -> io::Result<()> {
    serde_json::to_writer(&mut *out, record)?;
    out.write_all(b"\n")?;
    out.flush()
}

/// What happened while draining a test stream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamSummary {
    /// Records written
    pub written: usize,
    /// Records written with `success == false`
    pub failed: usize,
    /// The deadline elapsed before the stream finished
    pub deadline_hit: bool,
}

/// Write every record of `stream` in arrival order.
///
/// With a deadline, stops pulling once it elapses; the stream is dropped on
/// return, abandoning unfinished jobs.
pub async fn write_stream<W: Write>(
    mut stream: JobStream<TestsResult>,
    out: &mut W,
    deadline: Option<Duration>,
) -> io::Result<StreamSummary> {
    // a deadline too far out to represent is no deadline
    let until = deadline.and_then(|d| tokio::time::Instant::now().checked_add(d));
    let mut summary = StreamSummary::default();

    loop {
        let next = match until {
            Some(until) => match tokio::time::timeout_at(until, stream.next()).await {
                Ok(next) => next,
                Err(_) => {
                    warn!(
                        written = summary.written,
                        "deadline reached, abandoning remaining jobs"
                    );
                    summary.deadline_hit = true;
                    break;
                }
            },
            None => stream.next().await,
        };

        let Some(record) = next else {
            break;
        };

        write_record(out, &record)?;
        summary.written += 1;
        if !record.success {
            summary.failed += 1;
        }
    }

    debug!(
        "Stream finished: {} records, {} failed",
        summary.written, summary.failed
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraping::fanout;
    use crate::types::TestCase;

    #[test]
    fn test_one_line_per_record() {
        let mut out = Vec::new();
        let record = TestsResult::new("a", "").with_tests(vec![TestCase::new("1\n2", "3")]);

        write_record(&mut out, &record).unwrap();
        write_record(&mut out, &TestsResult::failure("cses", "boom", "b", "")).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(text.ends_with('\n'));

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["tests"][0]["input"], "1\n2");
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["success"], false);
        assert_eq!(second["error"], "cses: boom");
    }

    #[tokio::test]
    async fn test_write_stream_counts_failures() {
        let stream = JobStream::ready(vec![
            TestsResult::new("a", ""),
            TestsResult::failure("x", "bad", "b", ""),
            TestsResult::new("c", ""),
        ]);

        let mut out = Vec::new();
        let summary = write_stream(stream, &mut out, None).await.unwrap();

        assert_eq!(
            summary,
            StreamSummary {
                written: 3,
                failed: 1,
                deadline_hit: false
            }
        );
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 3);
    }

    #[tokio::test]
    async fn test_unrepresentable_deadline_is_ignored() {
        let stream = JobStream::ready(vec![TestsResult::new("a", "")]);

        let mut out = Vec::new();
        let summary = write_stream(stream, &mut out, Some(Duration::from_secs(u64::MAX)))
            .await
            .unwrap();

        assert_eq!(summary.written, 1);
        assert!(!summary.deadline_hit);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_stops_pulling() {
        let stream = fanout::spawn(
            vec![1u64, 100],
            2,
            |secs: u64| async move {
                tokio::time::sleep(Duration::from_secs(secs)).await;
                Ok::<_, String>(TestsResult::new(secs.to_string(), ""))
            },
            |secs: &u64, e| TestsResult::failure("x", e, &secs.to_string(), ""),
        );

        let mut out = Vec::new();
        let summary = write_stream(stream, &mut out, Some(Duration::from_secs(10)))
            .await
            .unwrap();

        assert!(summary.deadline_hit);
        assert_eq!(summary.written, 1);
        let line: serde_json::Value =
            serde_json::from_str(String::from_utf8(out).unwrap().trim()).unwrap();
        assert_eq!(line["problem_id"], "1");
    }
}
