//! Seqfan worker - main entry point
//!
//! Invoked once per manifest-creation event. The event document comes from
//! a file or stdin; the response document is printed on stdout.

use clap::Parser;
use seqfan_common::logging::{init_logging, LogConfig, LogLevel};
use seqfan_worker::{handle, WorkerConfig};
use std::path::PathBuf;
use std::process;
use tracing::error;

/// Seqfan worker - process one manifest-creation event
#[derive(Parser, Debug)]
#[command(name = "seqfan-worker")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Read the trigger event from this file instead of stdin
    #[arg(long)]
    event_file: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let base = if cli.verbose {
        LogConfig::new().with_level(LogLevel::Debug)
    } else {
        LogConfig::new()
    };
    let log_config =
        LogConfig::from_env_or(base.with_prefix("seqfan-worker")).unwrap_or_default();
    let _ = init_logging(&log_config);

    let raw_event = match read_event(&cli).await {
        Ok(raw) => raw,
        Err(e) => {
            error!(error = %e, "Failed to read event");
            eprintln!("Error: {e:#}");
            process::exit(1);
        }
    };

    let config = match WorkerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Worker configuration is incomplete");
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    let outcome = handle(&config, &raw_event).await;
    match serde_json::to_string(&outcome.response()) {
        Ok(json) => println!("{json}"),
        Err(e) => error!(error = %e, "Failed to serialize response"),
    }
    process::exit(outcome.exit_code());
}

async fn read_event(cli: &Cli) -> anyhow::Result<String> {
    use anyhow::Context;

    match &cli.event_file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .context(format!("Failed to read {}", path.display())),
        None => {
            let mut raw = String::new();
            use tokio::io::AsyncReadExt;
            tokio::io::stdin()
                .read_to_string(&mut raw)
                .await
                .context("Failed to read event from stdin")?;
            Ok(raw)
        }
    }
}
