//! One orchestrator run, phase by phase

use crate::config::RunConfig;
use crate::dispatch::Dispatcher;
use crate::pairing;
use crate::retrieve::BulkRetriever;
use crate::sharder::CommandSharder;
use crate::summary::RunSummary;
use crate::tracker::{CompletionTracker, OutputNamespace};
use anyhow::{Context, Result};
use chrono::Utc;
use seqfan_common::storage::StorageConfig;
use seqfan_common::{SeqfanError, Storage};
use std::sync::Arc;
use tracing::{info, warn};

/// How the run ended; the binary maps this to its exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Success,
    /// All jobs completed but some output files failed to download.
    PartialRetrieval,
    /// The completion wait exceeded the configured deadline.
    DeadlineExceeded,
}

/// Execute one full run: pair, dispatch, wait, retrieve.
pub async fn run(config: RunConfig) -> Result<(RunSummary, RunOutcome)> {
    let mut summary = RunSummary::new(Utc::now());

    let input = Storage::new(
        StorageConfig::for_region(&config.region),
        &config.input_bucket,
    )
    .await;
    let manifests = input.for_bucket(&config.manifest_bucket);
    let output = input.for_bucket(&config.output_bucket);

    // Phase 1: discovery and pairing.
    info!(bucket = %config.input_bucket, "Listing input bucket");
    let listing = input
        .list_objects("")
        .await
        .context("Failed to list input bucket")?;
    let pairing = pairing::match_pairs(listing.iter().map(|e| e.key.as_str()));
    summary.record_pairing(&pairing);

    // Phase 2: size-gated dispatch.
    let dispatcher = Dispatcher::new(
        input,
        manifests,
        Arc::new(CommandSharder::new(&config.sharder_cmd)),
        config.size_threshold_bytes,
        config.concurrency,
    );
    let dispatch = dispatcher.dispatch(pairing.pairs.clone()).await?;
    summary.record_dispatch(&dispatch);

    if dispatch.expected_jobs.is_empty() {
        info!("No jobs dispatched, nothing to wait for");
        summary.finish();
        return Ok((summary, RunOutcome::Success));
    }

    // Phase 3: poll for completion markers.
    let tracker = CompletionTracker::new(
        OutputNamespace::new(output.clone(), config.output_prefix.clone()),
        config.output_prefix.clone(),
        config.polling_interval,
        config.wait_timeout,
    );
    let completed = match tracker.wait_for(&dispatch.expected_jobs).await {
        Ok(completed) => completed,
        Err(SeqfanError::DeadlineExceeded {
            observed,
            expected,
            waited_secs,
        }) => {
            warn!(observed, expected, waited_secs, "Completion wait timed out");
            summary.jobs_completed = observed;
            summary.finish();
            return Ok((summary, RunOutcome::DeadlineExceeded));
        }
        Err(e) => return Err(e).context("Completion tracking failed"),
    };
    summary.jobs_completed = completed.len();

    // Phase 4: bulk retrieval.
    let retriever = BulkRetriever::new(
        output,
        config.output_prefix.clone(),
        config.dest_dir.clone(),
        config.concurrency,
    );
    let report = retriever.retrieve_all(&completed).await?;
    summary.record_retrieval(&report);
    summary.finish();

    let outcome = if report.failures.is_empty() {
        RunOutcome::Success
    } else {
        RunOutcome::PartialRetrieval
    };
    Ok((summary, outcome))
}
