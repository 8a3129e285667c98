//! cpscrape: competitive-programming judge scraper
//!
//! Prints newline-delimited JSON on stdout; logs go to stderr.

mod commands;

use anyhow::Result;
use clap::error::ErrorKind;
use clap::Parser;
use cpscrape::config::{Config, LogFormat, LoggingConfig};
use cpscrape::scraping::output;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use commands::invocation::{self, UsageError};

#[derive(Parser, Debug)]
#[command(name = "cpscrape")]
#[command(about = "Scrape contest problems, sample tests and contest lists from online judges")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Stop streaming tests after this many seconds
    #[arg(long)]
    deadline: Option<u64>,

    /// Judge: atcoder, codechef, codeforces or cses
    platform: Option<String>,

    /// metadata, tests or contests
    mode: Option<String>,

    /// Contest or category id
    args: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            eprintln!("{}", e.render());
            return usage_failure(&mut std::io::stdout().lock(), &UsageError::general(), 0);
        }
    };

    let invocation = match invocation::parse(cli.platform, cli.mode, cli.args) {
        Ok(invocation) => invocation,
        Err(usage) => return usage_failure(&mut std::io::stdout().lock(), &usage, cli.verbose),
    };

    let mut config = match Config::load_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            let usage = UsageError::new(invocation.kind(), e.to_string());
            return usage_failure(&mut std::io::stdout().lock(), &usage, cli.verbose);
        }
    };
    if let Some(deadline) = cli.deadline {
        config.scraper.deadline_seconds = Some(deadline);
    }

    init_logging(&config.logging, cli.verbose)?;
    debug!("Running {:?}", invocation);

    commands::scrape::run(invocation, config).await
}

/// Log and print the failure record for a malformed call, then exit 1.
///
/// Runs before the configuration is known, so logging starts with defaults.
fn usage_failure<W: Write>(out: &mut W, usage: &UsageError, verbose: u8) -> Result<ExitCode> {
    // already installed is fine
    let _ = init_logging(&LoggingConfig::default(), verbose);
    warn!("{}", usage.message);
    output::write_record(out, &usage.to_record())?;
    Ok(ExitCode::FAILURE)
}

/// Install the stderr subscriber; `RUST_LOG` overrides the configured level
fn init_logging(logging: &LoggingConfig, verbose: u8) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.filter_directive(verbose)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match logging.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    }
    .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_collects_positionals() {
        let cli = Cli::try_parse_from(["cpscrape", "-vv", "--deadline", "30", "cses", "tests", "graph_algorithms"])
            .unwrap();

        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.deadline, Some(30));
        assert_eq!(cli.platform.as_deref(), Some("cses"));
        assert_eq!(cli.mode.as_deref(), Some("tests"));
        assert_eq!(cli.args, vec!["graph_algorithms".to_string()]);
    }

    #[test]
    fn test_cli_accepts_extra_positionals_for_validation() {
        let cli = Cli::try_parse_from(["cpscrape", "atcoder", "contests", "extra", "more"]).unwrap();
        assert_eq!(cli.args.len(), 2);

        let cli = Cli::try_parse_from(["cpscrape"]).unwrap();
        assert!(cli.platform.is_none());
    }

    #[test]
    fn test_usage_failure_logs_and_prints_record() {
        let usage = invocation::parse(Some("cses".into()), Some("tests".into()), Vec::new()).unwrap_err();
        let mut buf = Vec::new();

        let code = usage_failure(&mut buf, &usage, 0).unwrap();

        assert_eq!(format!("{:?}", code), format!("{:?}", ExitCode::FAILURE));
        assert!(tracing::dispatcher::has_been_set());
        let line = String::from_utf8(buf).unwrap();
        assert!(line.ends_with('\n'));
        let record: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(record["success"], false);
        assert_eq!(record["error"], usage.message.as_str());
        assert_eq!(record["problem_id"], "");
    }

    #[test]
    fn test_cli_rejects_bad_deadline() {
        assert!(Cli::try_parse_from(["cpscrape", "--deadline", "soon", "cses", "contests"]).is_err());
    }
}
