//! Seqfan orchestrator - main entry point

use clap::Parser;
use seqfan_common::logging::{init_logging, LogConfig, LogLevel};
use seqfan_orchestrator::{run, Cli, RunConfig, RunOutcome};
use std::process;
use tracing::error;

// Exit codes: 0 success, 1 fatal error, 3 partial retrieval failure,
// 4 completion-wait deadline exceeded.
const EXIT_PARTIAL: i32 = 3;
const EXIT_DEADLINE: i32 = 4;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let base = if cli.verbose {
        LogConfig::new().with_level(LogLevel::Debug)
    } else {
        LogConfig::new()
    };
    let log_config = LogConfig::from_env_or(base.with_prefix("seqfan")).unwrap_or_default();
    let _ = init_logging(&log_config);

    let config = RunConfig::from_cli(&cli);
    match run(config).await {
        Ok((summary, outcome)) => {
            match summary.to_json() {
                Ok(json) => println!("{json}"),
                Err(e) => error!(error = %e, "Failed to serialize run summary"),
            }
            match outcome {
                RunOutcome::Success => {}
                RunOutcome::PartialRetrieval => process::exit(EXIT_PARTIAL),
                RunOutcome::DeadlineExceeded => process::exit(EXIT_DEADLINE),
            }
        }
        Err(e) => {
            error!(error = %e, "Run failed");
            eprintln!("Error: {e:#}");
            process::exit(1);
        }
    }
}
