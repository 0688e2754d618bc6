//! Sharder boundary
//!
//! Splitting an oversized pair is delegated to an external program with a
//! synchronous completion contract: by the time the call returns a count of
//! N, manifests for shard indices 0..N must already exist in the manifest
//! bucket. The orchestrator trusts the count and does not re-verify.

use async_trait::async_trait;
use seqfan_common::types::PairKey;
use seqfan_common::{Result, SeqfanError};
use serde::Deserialize;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, info};

/// Inputs handed to the sharder for one oversized pair.
#[derive(Debug, Clone)]
pub struct SplitRequest {
    pub input_bucket: String,
    pub r1_key: String,
    pub r2_key: String,
    pub pair_key: PairKey,
    pub manifest_bucket: String,
}

/// Splits one pair into bounded-size shards and publishes their manifests.
#[async_trait]
pub trait Sharder: Send + Sync {
    /// Returns the number of shards created. Errors remove the whole pair
    /// from the run; there is no automatic retry.
    async fn split_pair(&self, request: &SplitRequest) -> Result<u32>;
}

/// Structured report the sharder program prints on stdout.
#[derive(Debug, Deserialize)]
struct SplitReport {
    shard_count: i64,
}

/// Sharder implementation backed by an external program.
///
/// The program receives `<input-bucket> <r1-key> <r2-key> <pair-key>
/// <manifest-bucket>` and must print a JSON `{"shard_count": N}` report on
/// stdout; anything else is treated as failure.
pub struct CommandSharder {
    program: PathBuf,
}

impl CommandSharder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl Sharder for CommandSharder {
    async fn split_pair(&self, request: &SplitRequest) -> Result<u32> {
        info!(
            pair_key = %request.pair_key,
            program = %self.program.display(),
            "Splitting oversized pair"
        );

        let output = Command::new(&self.program)
            .arg(&request.input_bucket)
            .arg(&request.r1_key)
            .arg(&request.r2_key)
            .arg(request.pair_key.as_str())
            .arg(&request.manifest_bucket)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SeqfanError::ExternalProcess {
                program: self.program.display().to_string(),
                detail: format!("exit {}: {}", output.status, stderr.trim()),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let count = parse_report(&stdout).map_err(|detail| SeqfanError::ExternalProcess {
            program: self.program.display().to_string(),
            detail,
        })?;

        debug!(pair_key = %request.pair_key, count, "Sharder reported shard count");
        Ok(count)
    }
}

/// Parse the sharder's stdout into a shard count.
fn parse_report(stdout: &str) -> std::result::Result<u32, String> {
    let report: SplitReport = serde_json::from_str(stdout.trim())
        .map_err(|e| format!("malformed split report: {e}"))?;
    u32::try_from(report.shard_count)
        .map_err(|_| format!("sharder reported failure count {}", report.shard_count))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_report() {
        assert_eq!(parse_report("{\"shard_count\": 4}\n").unwrap(), 4);
        assert_eq!(parse_report("{\"shard_count\": 0}").unwrap(), 0);
    }

    #[test]
    fn rejects_failure_sentinel() {
        let err = parse_report("{\"shard_count\": -1}").unwrap_err();
        assert!(err.contains("-1"));
    }

    #[test]
    fn rejects_unstructured_output() {
        assert!(parse_report("PAIR_COUNT\n7").is_err());
        assert!(parse_report("").is_err());
        assert!(parse_report("{\"shard_count\": 2} trailing").is_err());
    }
}
