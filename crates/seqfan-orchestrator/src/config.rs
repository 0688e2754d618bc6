//! Orchestrator run configuration
//!
//! Built once from the CLI and passed by reference into every component;
//! nothing in the run reads process-global state.

use crate::Cli;
use std::path::PathBuf;
use std::time::Duration;

const GIB: u64 = 1024 * 1024 * 1024;

/// Default combined-size gate for direct dispatch. Tied to the worker's
/// ephemeral storage ceiling, not to its memory limit.
pub const DEFAULT_SIZE_THRESHOLD_BYTES: u64 = 7 * GIB;

/// Immutable configuration for one orchestrator run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub region: String,
    pub input_bucket: String,
    pub manifest_bucket: String,
    pub output_bucket: String,
    pub dest_dir: PathBuf,
    pub polling_interval: Duration,
    pub wait_timeout: Option<Duration>,
    pub concurrency: usize,
    pub size_threshold_bytes: u64,
    pub sharder_cmd: PathBuf,
    pub output_prefix: String,
}

impl RunConfig {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            region: cli.region.clone(),
            input_bucket: cli.input_bucket.clone(),
            manifest_bucket: cli.manifest_bucket.clone(),
            output_bucket: cli.output_bucket.clone(),
            dest_dir: cli.dest_dir.clone(),
            polling_interval: Duration::from_secs(cli.polling_interval),
            wait_timeout: cli.wait_timeout.map(Duration::from_secs),
            concurrency: cli.concurrency.max(1),
            size_threshold_bytes: cli.size_threshold_gib * GIB,
            sharder_cmd: cli.sharder_cmd.clone(),
            output_prefix: seqfan_common::types::DEFAULT_OUTPUT_PREFIX.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_config_from_cli() {
        let cli = Cli::parse_from([
            "seqfan",
            "--region",
            "us-east-2",
            "--input-bucket",
            "reads",
            "--manifest-bucket",
            "manifests",
            "--output-bucket",
            "outputs",
            "--dest-dir",
            "/data/out",
        ]);
        let config = RunConfig::from_cli(&cli);
        assert_eq!(config.polling_interval, Duration::from_secs(30));
        assert_eq!(config.wait_timeout, None);
        assert_eq!(config.concurrency, 20);
        assert_eq!(config.size_threshold_bytes, DEFAULT_SIZE_THRESHOLD_BYTES);
        assert_eq!(config.output_prefix, "piscem_output");
    }
}
