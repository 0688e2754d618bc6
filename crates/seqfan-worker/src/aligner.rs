//! External aligner invocation
//!
//! The aligner is an opaque binary with a fixed command-line contract:
//! comma-joined R1 and R2 file lists, an index, a chemistry geometry, a
//! thread count, and an output directory. A non-zero exit is terminal for
//! the invocation; there is no internal retry.

use seqfan_common::{Result, SeqfanError};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

pub struct Aligner {
    program: PathBuf,
    index: PathBuf,
    geometry: String,
    threads: u32,
    timeout: Option<Duration>,
}

impl Aligner {
    pub fn new(
        program: impl Into<PathBuf>,
        index: impl Into<PathBuf>,
        geometry: impl Into<String>,
        threads: u32,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            program: program.into(),
            index: index.into(),
            geometry: geometry.into(),
            threads,
            timeout,
        }
    }

    /// Arguments for one mapping invocation, split out for testability.
    fn command_args(&self, r1: &[PathBuf], r2: &[PathBuf], out_dir: &Path) -> Vec<String> {
        let join = |files: &[PathBuf]| {
            files
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join(",")
        };

        vec![
            "map-sc".to_string(),
            "-i".to_string(),
            self.index.to_string_lossy().into_owned(),
            "-g".to_string(),
            self.geometry.clone(),
            "-1".to_string(),
            join(r1),
            "-2".to_string(),
            join(r2),
            "-t".to_string(),
            self.threads.to_string(),
            "-o".to_string(),
            out_dir.to_string_lossy().into_owned(),
        ]
    }

    /// Run the aligner over the downloaded read files.
    pub async fn map(&self, r1: &[PathBuf], r2: &[PathBuf], out_dir: &Path) -> Result<()> {
        let args = self.command_args(r1, r2, out_dir);
        info!(program = %self.program.display(), ?args, "Running aligner");

        let invocation = Command::new(&self.program).args(&args).output();
        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, invocation).await.map_err(|_| {
                SeqfanError::ExternalProcess {
                    program: self.program.display().to_string(),
                    detail: format!("timed out after {}s", limit.as_secs()),
                }
            })??,
            None => invocation.await?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SeqfanError::ExternalProcess {
                program: self.program.display().to_string(),
                detail: format!("exit {}: {}", output.status, stderr.trim()),
            });
        }

        debug!("Aligner completed successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_fixed_command_line() {
        let aligner = Aligner::new("/var/task/piscem", "/var/task/index", "chromium_v3", 6, None);
        let r1 = vec![
            PathBuf::from("/tmp/in/a_L001_R1_001.fastq.gz"),
            PathBuf::from("/tmp/in/a_L001_R1_002.fastq.gz"),
        ];
        let r2 = vec![PathBuf::from("/tmp/in/a_L001_R2_001.fastq.gz")];

        let args = aligner.command_args(&r1, &r2, Path::new("/tmp/output/map"));
        assert_eq!(args[0], "map-sc");
        assert_eq!(args[1..3], ["-i".to_string(), "/var/task/index".to_string()]);
        assert_eq!(args[3..5], ["-g".to_string(), "chromium_v3".to_string()]);
        // Read lists are comma-joined, not repeated flags.
        assert_eq!(
            args[6],
            "/tmp/in/a_L001_R1_001.fastq.gz,/tmp/in/a_L001_R1_002.fastq.gz"
        );
        assert_eq!(args[8], "/tmp/in/a_L001_R2_001.fastq.gz");
        assert_eq!(args[9..11], ["-t".to_string(), "6".to_string()]);
        assert_eq!(args[12], "/tmp/output/map");
    }
}
