//! Bulk retrieval of completed output folders
//!
//! Downloads every object beneath each completed job's prefix into a local
//! destination mirroring the key structure. Folders are independent and
//! per-file failures are gathered, not fatal: one bad object must not sink
//! a run that waited hours for its markers.

use anyhow::{Context, Result};
use seqfan_common::Storage;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// One file that could not be downloaded.
#[derive(Debug, Clone)]
pub struct RetrievalFailure {
    pub key: String,
    pub error: String,
}

/// Aggregate result of the retrieval phase.
#[derive(Debug, Default)]
pub struct RetrievalReport {
    pub downloaded: usize,
    pub skipped: usize,
    pub failures: Vec<RetrievalFailure>,
}

/// Downloads completed job outputs over a bounded pool.
pub struct BulkRetriever {
    output: Storage,
    prefix: String,
    dest_dir: PathBuf,
    concurrency: usize,
}

enum FileOutcome {
    Downloaded,
    Skipped,
}

/// A local file counts as already retrieved only when it exists with the
/// listed byte size; a partial download from an interrupted run is re-fetched.
async fn already_present(local_path: &Path, expected_size: u64) -> bool {
    match tokio::fs::metadata(local_path).await {
        Ok(meta) => meta.len() == expected_size,
        Err(_) => false,
    }
}

impl BulkRetriever {
    pub fn new(
        output: Storage,
        prefix: impl Into<String>,
        dest_dir: impl Into<PathBuf>,
        concurrency: usize,
    ) -> Self {
        Self {
            output,
            prefix: prefix.into(),
            dest_dir: dest_dir.into(),
            concurrency,
        }
    }

    /// Mirror every object under each completed folder to
    /// `{dest_dir}/{key}`. A file already present locally with the listed
    /// byte size is skipped, so re-running against a populated destination
    /// is idempotent.
    pub async fn retrieve_all(&self, folders: &BTreeSet<String>) -> Result<RetrievalReport> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks: JoinSet<std::result::Result<FileOutcome, RetrievalFailure>> =
            JoinSet::new();

        for folder in folders {
            let folder_prefix = format!("{}/{}/", self.prefix, folder);
            let entries = self
                .output
                .list_objects(&folder_prefix)
                .await
                .context(format!("Failed to list outputs under {folder_prefix}"))?;
            debug!(folder, files = entries.len(), "Queueing folder download");

            for entry in entries {
                let storage = self.output.clone();
                let local_path = self.dest_dir.join(&entry.key);
                let semaphore = Arc::clone(&semaphore);

                tasks.spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .expect("retrieval semaphore closed");

                    if already_present(&local_path, entry.size).await {
                        debug!(key = %entry.key, "Already present locally, skipping");
                        return Ok(FileOutcome::Skipped);
                    }

                    storage
                        .download_to_file(&entry.key, &local_path)
                        .await
                        .map(|_| FileOutcome::Downloaded)
                        .map_err(|e| RetrievalFailure {
                            key: entry.key,
                            error: e.to_string(),
                        })
                });
            }
        }

        let mut report = RetrievalReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined.context("Download task panicked")? {
                Ok(FileOutcome::Downloaded) => report.downloaded += 1,
                Ok(FileOutcome::Skipped) => report.skipped += 1,
                Err(failure) => {
                    warn!(key = %failure.key, error = %failure.error, "Download failed");
                    report.failures.push(failure);
                }
            }
        }

        info!(
            "Retrieval complete: {} downloaded, {} skipped, {} failed",
            report.downloaded,
            report.skipped,
            report.failures.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rerun_skips_files_with_matching_size() {
        let dest = tempfile::tempdir().unwrap();
        let path = dest.path().join("piscem_output/job_p0/map.rad");
        tokio::fs::create_dir_all(path.parent().unwrap())
            .await
            .unwrap();
        tokio::fs::write(&path, vec![0u8; 128]).await.unwrap();

        assert!(already_present(&path, 128).await);
    }

    #[tokio::test]
    async fn size_mismatch_forces_redownload() {
        let dest = tempfile::tempdir().unwrap();
        let path = dest.path().join("truncated.rad");
        tokio::fs::write(&path, vec![0u8; 64]).await.unwrap();

        // Interrupted transfer left a short file.
        assert!(!already_present(&path, 128).await);
    }

    #[tokio::test]
    async fn missing_file_is_downloaded() {
        let dest = tempfile::tempdir().unwrap();
        assert!(!already_present(&dest.path().join("fresh.rad"), 128).await);
    }
}
