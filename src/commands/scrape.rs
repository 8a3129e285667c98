use anyhow::{Context, Result};
use cpscrape::{
    config::Config,
    scraping::{output, registry, Scraper},
};
use std::io::{self, Write};
use std::process::ExitCode;
use tracing::{debug, info, warn};

use super::invocation::{failure_record, Invocation};

/// Run one invocation, writing JSON lines to stdout.
///
/// `metadata` and `contests` exit 1 when their result is a failure; `tests`
/// always exits 0 since failures are carried per record.
pub async fn run(invocation: Invocation, config: Config) -> Result<ExitCode> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let scraper = match registry::create(invocation.platform(), &config.scraper) {
        Ok(scraper) => scraper,
        Err(e) => {
            warn!("Failed to create {} adapter: {}", invocation.platform(), e);
            output::write_record(&mut out, &failure_record(invocation.kind(), &e.to_string()))?;
            return Ok(ExitCode::FAILURE);
        }
    };

    let code = match &invocation {
        Invocation::Metadata { contest_id, .. } => {
            let result = scraper.metadata(contest_id).await;
            output::write_record(&mut out, &result).context("Failed to write result")?;
            exit_code(result.success)
        }
        Invocation::Contests { .. } => {
            let result = scraper.contests().await;
            output::write_record(&mut out, &result).context("Failed to write result")?;
            exit_code(result.success)
        }
        Invocation::Tests { contest_id, .. } => {
            stream_tests(&scraper, contest_id, &config, &mut out).await?;
            ExitCode::SUCCESS
        }
    };

    if let Some(stats) = scraper.stats() {
        debug!(
            "Fetch stats: {} requests, {} retries, {} ok, {} failed",
            stats.total_fetches, stats.retries, stats.successes, stats.failures
        );
    }

    Ok(code)
}

async fn stream_tests<W: Write>(
    scraper: &Scraper,
    contest_id: &str,
    config: &Config,
    out: &mut W,
) -> Result<()> {
    let stream = scraper.tests(contest_id).await;
    let summary = output::write_stream(stream, out, config.scraper.deadline())
        .await
        .context("Failed to write test records")?;

    info!(
        "Streamed {} records for {} ({} failed{})",
        summary.written,
        contest_id,
        summary.failed,
        if summary.deadline_hit { ", deadline reached" } else { "" }
    );
    Ok(())
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
