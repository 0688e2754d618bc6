//! Worker invocation state machine
//!
//! Reset → validate → fetch → classify → execute → publish. Any failure
//! before the final marker upload leaves no marker, so the job stays
//! invisible to the completion tracker until re-triggered externally.

use crate::aligner::Aligner;
use crate::config::WorkerConfig;
use crate::event::ManifestEvent;
use seqfan_common::storage::StorageConfig;
use seqfan_common::types::{job_id_from_manifest_key, Manifest, MANIFEST_SUFFIX, MARKER_FILE};
use seqfan_common::{Result, SeqfanError, Storage};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Terminal state of one invocation.
#[derive(Debug)]
pub enum HandlerOutcome {
    Completed { job_id: String },
    /// Unrelated event sharing the namespace; not a failure.
    Skipped { reason: String },
    InvalidEvent { reason: String },
    Failed { reason: String, status_code: u16 },
}

/// Lambda-shaped response document printed by the binary.
#[derive(Debug, Serialize)]
pub struct HandlerResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl HandlerOutcome {
    pub fn status_code(&self) -> u16 {
        match self {
            HandlerOutcome::Completed { .. } | HandlerOutcome::Skipped { .. } => 200,
            HandlerOutcome::InvalidEvent { .. } => 400,
            HandlerOutcome::Failed { status_code, .. } => *status_code,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            HandlerOutcome::Completed { .. } | HandlerOutcome::Skipped { .. } => 0,
            HandlerOutcome::InvalidEvent { .. } => 2,
            HandlerOutcome::Failed { .. } => 1,
        }
    }

    pub fn response(&self) -> HandlerResponse {
        let body = match self {
            HandlerOutcome::Completed { job_id } => format!("Mapping completed for {job_id}"),
            HandlerOutcome::Skipped { reason } => format!("Skipped: {reason}"),
            HandlerOutcome::InvalidEvent { reason } => format!("Invalid event: {reason}"),
            HandlerOutcome::Failed { reason, .. } => format!("Failed: {reason}"),
        };
        HandlerResponse {
            status_code: self.status_code(),
            body,
        }
    }
}

/// Process one trigger event to a terminal outcome. Never returns Err; all
/// failures are folded into the outcome.
pub async fn handle(config: &WorkerConfig, raw_event: &str) -> HandlerOutcome {
    match process(config, raw_event).await {
        Ok(outcome) => outcome,
        Err(SeqfanError::InvalidEvent(reason)) => {
            warn!(reason, "Rejecting event");
            HandlerOutcome::InvalidEvent { reason }
        }
        Err(e) => {
            let status_code = if e.is_validation() { 400 } else { 500 };
            warn!(error = %e, status_code, "Invocation failed");
            HandlerOutcome::Failed {
                reason: e.to_string(),
                status_code,
            }
        }
    }
}

async fn process(config: &WorkerConfig, raw_event: &str) -> Result<HandlerOutcome> {
    // Reset: the substrate reuses workers, so ephemeral storage may hold a
    // prior job's files. Wipe it before anything else.
    reset_scratch(&config.scratch_dir).await;

    // Validate: accept only manifest creations in the expected namespace.
    let event = ManifestEvent::parse(raw_event)?;
    if event.bucket != config.manifest_bucket {
        return Ok(HandlerOutcome::Skipped {
            reason: format!("event for unexpected bucket {}", event.bucket),
        });
    }
    if !event.key.ends_with(MANIFEST_SUFFIX) {
        return Ok(HandlerOutcome::Skipped {
            reason: format!("key {} is not a manifest", event.key),
        });
    }
    let job_id = job_id_from_manifest_key(&event.key)
        .ok_or_else(|| SeqfanError::InvalidEvent(format!("unusable manifest key {}", event.key)))?;
    info!(job_id, manifest_key = %event.key, "Processing manifest event");

    // Fetch: manifest first, then both referenced files. Locators may
    // point at a different bucket than the manifest's own.
    let manifests = Storage::new(StorageConfig::for_region(&config.region), &event.bucket).await;
    let contents = manifests
        .get_bytes(&event.key)
        .await
        .map_err(|e| SeqfanError::Storage(e.to_string()))?;
    let manifest = Manifest::parse(&event.key, &String::from_utf8_lossy(&contents))?;

    let input_dir = config.scratch_dir.join("input_files");
    tokio::fs::create_dir_all(&input_dir).await?;

    let mut downloaded = Vec::new();
    for locator in manifest.locators() {
        let local_path = input_dir.join(locator.file_name());
        if tokio::fs::try_exists(&local_path).await.unwrap_or(false) {
            debug!(path = %local_path.display(), "Already present, skipping download");
        } else {
            manifests
                .for_bucket(&locator.bucket)
                .download_to_file(&locator.key, &local_path)
                .await
                .map_err(|e| SeqfanError::Storage(e.to_string()))?;
        }
        downloaded.push(local_path);
    }

    // Classify: a shard job must have exactly one file of each read type.
    let (r1, r2) = classify_reads(&downloaded);
    if r1.is_empty() {
        return Err(SeqfanError::MissingReadSide {
            job_id,
            read_type: "R1".to_string(),
        });
    }
    if r2.is_empty() {
        return Err(SeqfanError::MissingReadSide {
            job_id,
            read_type: "R2".to_string(),
        });
    }

    // Execute.
    let out_dir = config.scratch_dir.join("output");
    tokio::fs::create_dir_all(&out_dir).await?;
    let aligner = Aligner::new(
        &config.aligner_path,
        &config.index_path,
        &config.geometry,
        config.threads,
        config.aligner_timeout,
    );
    aligner
        .map(&r1, &r2, &out_dir.join("split_map_output_transcriptome"))
        .await?;

    // Publish: every output first, marker strictly last, so the tracker
    // never sees a marker over incomplete outputs.
    let output = manifests.for_bucket(&config.output_bucket);
    let files = collect_files(&out_dir).await?;
    for path in &files {
        let key = output_key(&config.output_prefix, &job_id, &out_dir, path)?;
        output
            .put_file(&key, path)
            .await
            .map_err(|e| SeqfanError::Storage(e.to_string()))?;
    }
    let marker_key = format!("{}/{}/{}", config.output_prefix, job_id, MARKER_FILE);
    output
        .put_empty(&marker_key)
        .await
        .map_err(|e| SeqfanError::Storage(e.to_string()))?;

    info!(job_id, files = files.len(), "Published outputs and completion marker");
    Ok(HandlerOutcome::Completed { job_id })
}

/// Wipe everything inside the scratch directory without removing the
/// directory itself. Deletion failures are warnings; a leftover file only
/// risks a skipped re-download.
async fn reset_scratch(scratch_dir: &Path) {
    let Ok(mut entries) = tokio::fs::read_dir(scratch_dir).await else {
        return;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let result = match entry.file_type().await {
            Ok(ft) if ft.is_dir() => tokio::fs::remove_dir_all(&path).await,
            _ => tokio::fs::remove_file(&path).await,
        };
        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "Unable to clear scratch entry");
        }
    }
}

/// Split downloaded files into R1/R2 sets by filename substring.
fn classify_reads(files: &[PathBuf]) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let by_marker = |marker: &str| {
        files
            .iter()
            .filter(|p| {
                p.file_name()
                    .map(|n| n.to_string_lossy().contains(marker))
                    .unwrap_or(false)
            })
            .cloned()
            .collect::<Vec<_>>()
    };
    (by_marker("_R1_"), by_marker("_R2_"))
}

/// Object key for one output file, preserving its path relative to the
/// aligner output directory.
fn output_key(prefix: &str, job_id: &str, out_dir: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(out_dir)
        .map_err(|_| SeqfanError::Storage(format!("{} escapes output dir", path.display())))?;
    let relative = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    Ok(format!("{prefix}/{job_id}/{relative}"))
}

/// Depth-first listing of every file under a directory.
async fn collect_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut pending = vec![root.to_path_buf()];
    let mut files = Vec::new();

    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                pending.push(path);
            } else {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}
