//! Worker configuration
//!
//! Sourced from the environment once at startup (the execution substrate
//! injects these), then passed by reference through the handler. The env
//! variable names match the deployment's existing contract.

use seqfan_common::types::DEFAULT_OUTPUT_PREFIX;
use seqfan_common::{Result, SeqfanError};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Fixed thread count handed to the aligner; sized to the worker's vCPU
/// allocation.
pub const ALIGNER_THREADS: u32 = 6;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub region: String,
    /// Only events for this bucket are processed; others are skipped.
    pub manifest_bucket: String,
    pub output_bucket: String,
    pub output_prefix: String,
    /// Ephemeral local storage, wiped at the start of every invocation.
    pub scratch_dir: PathBuf,
    pub aligner_path: PathBuf,
    pub index_path: PathBuf,
    pub geometry: String,
    pub threads: u32,
    /// Upper bound on one aligner invocation; unset means no limit.
    pub aligner_timeout: Option<Duration>,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self> {
        let manifest_bucket = env::var("S3_INPUT_TXT_BUCKET_NAME")
            .map_err(|_| SeqfanError::Config("S3_INPUT_TXT_BUCKET_NAME is not set".into()))?;
        let output_bucket = env::var("S3_OUTPUT_BUCKET_NAME")
            .map_err(|_| SeqfanError::Config("S3_OUTPUT_BUCKET_NAME is not set".into()))?;

        Ok(Self {
            region: env::var("AWS_REGION").unwrap_or_else(|_| "us-east-2".to_string()),
            manifest_bucket,
            output_bucket,
            output_prefix: env::var("S3_OUTPUT_PREFIX")
                .unwrap_or_else(|_| DEFAULT_OUTPUT_PREFIX.to_string()),
            scratch_dir: env::var("SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/tmp")),
            aligner_path: env::var("ALIGNER_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/var/task/piscem")),
            index_path: env::var("ALIGNER_INDEX")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    PathBuf::from(
                        "/var/task/index_output_transcriptome/index_output_transcriptome",
                    )
                }),
            geometry: env::var("ALIGNER_GEOMETRY").unwrap_or_else(|_| "chromium_v3".to_string()),
            threads: ALIGNER_THREADS,
            aligner_timeout: match env::var("ALIGNER_TIMEOUT_SECS") {
                Ok(raw) => {
                    let secs: u64 = raw.parse().map_err(|_| {
                        SeqfanError::Config(format!(
                            "ALIGNER_TIMEOUT_SECS must be a whole number of seconds, got {raw:?}"
                        ))
                    })?;
                    Some(Duration::from_secs(secs))
                }
                Err(_) => None,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_buckets_are_config_errors() {
        // Env mutation is process-wide; keep both cases in one test.
        env::remove_var("S3_INPUT_TXT_BUCKET_NAME");
        env::remove_var("S3_OUTPUT_BUCKET_NAME");
        env::remove_var("ALIGNER_TIMEOUT_SECS");
        assert!(matches!(
            WorkerConfig::from_env().unwrap_err(),
            SeqfanError::Config(_)
        ));

        env::set_var("S3_INPUT_TXT_BUCKET_NAME", "manifests");
        env::set_var("S3_OUTPUT_BUCKET_NAME", "outputs");
        let config = WorkerConfig::from_env().unwrap();
        assert_eq!(config.manifest_bucket, "manifests");
        assert_eq!(config.output_prefix, "piscem_output");
        assert_eq!(config.threads, 6);
        assert_eq!(config.aligner_timeout, None);
    }
}
