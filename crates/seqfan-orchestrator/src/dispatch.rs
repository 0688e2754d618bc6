//! Shard decision and manifest dispatch
//!
//! For each matched pair: look up the combined object size, dispatch it
//! directly as shard 0 when it fits under the threshold, otherwise hand it
//! to the sharder. Publishing a manifest IS the dispatch signal — the
//! eventing substrate watching the manifest bucket invokes a worker per
//! created object, so there is no separate enqueue step.

use crate::pairing::MatchedPair;
use crate::sharder::{Sharder, SplitRequest};
use anyhow::{Context, Result};
use seqfan_common::types::{FilePair, Locator, Manifest, ShardJob};
use seqfan_common::Storage;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Disposition of one pair given its combined size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardDecision {
    /// Dispatch the pair as-is, shard index 0.
    Direct,
    /// Split into bounded-size shards before dispatch.
    Split,
}

impl ShardDecision {
    /// Direct dispatch only strictly below the threshold.
    pub fn for_size(combined_size_bytes: u64, threshold_bytes: u64) -> Self {
        if combined_size_bytes < threshold_bytes {
            ShardDecision::Direct
        } else {
            ShardDecision::Split
        }
    }
}

/// Writes one manifest object per dispatched shard job.
#[derive(Clone)]
pub struct ManifestPublisher {
    manifests: Storage,
}

impl ManifestPublisher {
    pub fn new(manifests: Storage) -> Self {
        Self { manifests }
    }

    /// Publish the manifest for one job at its deterministic key.
    /// Republishing identical content is a protocol no-op, though the store
    /// may re-trigger a worker (accepted at-least-once delivery).
    pub async fn publish(&self, job: &ShardJob) -> Result<()> {
        let key = job.manifest_key();
        let contents = Manifest::for_job(job).to_contents();
        self.manifests
            .put_bytes(&key, contents.into_bytes())
            .await
            .context(format!("Failed to publish manifest {key}"))?;
        info!(job_id = %job.job_id(), manifest_key = %key, "Dispatched job");
        Ok(())
    }
}

/// Aggregate result of the dispatch phase.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    /// Identifiers of every dispatched job; the completion tracker must
    /// observe a marker for each before the run can proceed.
    pub expected_jobs: BTreeSet<String>,
    pub pairs_direct: usize,
    pub pairs_sharded: usize,
    pub pairs_failed: usize,
}

enum PairDisposition {
    Direct,
    Sharded,
    Failed,
}

/// Runs the dispatch phase over a bounded pool.
pub struct Dispatcher {
    input: Storage,
    publisher: ManifestPublisher,
    sharder: Arc<dyn Sharder>,
    manifest_bucket: String,
    threshold_bytes: u64,
    concurrency: usize,
}

impl Dispatcher {
    pub fn new(
        input: Storage,
        manifests: Storage,
        sharder: Arc<dyn Sharder>,
        threshold_bytes: u64,
        concurrency: usize,
    ) -> Self {
        let manifest_bucket = manifests.bucket().to_string();
        Self {
            input,
            publisher: ManifestPublisher::new(manifests),
            sharder,
            manifest_bucket,
            threshold_bytes,
            concurrency,
        }
    }

    /// Dispatch every matched pair. Pairs whose size lookup, sharding, or
    /// manifest publish fails are logged and dropped from the run; nothing
    /// here is retried.
    pub async fn dispatch(&self, pairs: Vec<MatchedPair>) -> Result<DispatchOutcome> {
        let expected: Arc<Mutex<BTreeSet<String>>> = Arc::new(Mutex::new(BTreeSet::new()));
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks: JoinSet<PairDisposition> = JoinSet::new();

        for pair in pairs {
            let input = self.input.clone();
            let publisher = self.publisher.clone();
            let sharder = Arc::clone(&self.sharder);
            let expected = Arc::clone(&expected);
            let semaphore = Arc::clone(&semaphore);
            let manifest_bucket = self.manifest_bucket.clone();
            let threshold = self.threshold_bytes;

            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("dispatch semaphore closed");
                dispatch_pair(pair, input, publisher, sharder, expected, manifest_bucket, threshold)
                    .await
            });
        }

        let mut outcome = DispatchOutcome::default();
        while let Some(joined) = tasks.join_next().await {
            match joined.context("Dispatch task panicked")? {
                PairDisposition::Direct => outcome.pairs_direct += 1,
                PairDisposition::Sharded => outcome.pairs_sharded += 1,
                PairDisposition::Failed => outcome.pairs_failed += 1,
            }
        }

        outcome.expected_jobs = drain_expected(&expected).await;

        info!(
            "Dispatch complete: {} direct, {} sharded, {} failed, {} jobs expected",
            outcome.pairs_direct,
            outcome.pairs_sharded,
            outcome.pairs_failed,
            outcome.expected_jobs.len()
        );
        Ok(outcome)
    }
}

/// Drain the shared job set rather than unwrapping the Arc: every task has
/// been joined by the time this runs, but the set must not come back empty
/// if a clone ever outlives the pool.
async fn drain_expected(expected: &Arc<Mutex<BTreeSet<String>>>) -> BTreeSet<String> {
    std::mem::take(&mut *expected.lock().await)
}

async fn dispatch_pair(
    pair: MatchedPair,
    input: Storage,
    publisher: ManifestPublisher,
    sharder: Arc<dyn Sharder>,
    expected: Arc<Mutex<BTreeSet<String>>>,
    manifest_bucket: String,
    threshold: u64,
) -> PairDisposition {
    let combined = match combined_size(&input, &pair).await {
        Ok(size) => size,
        Err(e) => {
            error!(pair_key = %pair.pair_key, error = %e, "Size lookup failed, dropping pair");
            return PairDisposition::Failed;
        }
    };

    let file_pair = FilePair {
        pair_key: pair.pair_key.clone(),
        r1: Locator::new(input.bucket(), &pair.r1_key),
        r2: Locator::new(input.bucket(), &pair.r2_key),
        combined_size_bytes: combined,
    };

    match ShardDecision::for_size(combined, threshold) {
        ShardDecision::Direct => {
            let job = ShardJob {
                pair_key: file_pair.pair_key,
                shard_index: 0,
                r1: file_pair.r1,
                r2: file_pair.r2,
            };
            if let Err(e) = publisher.publish(&job).await {
                error!(job_id = %job.job_id(), error = %e, "Manifest publish failed, dropping pair");
                return PairDisposition::Failed;
            }
            expected.lock().await.insert(job.job_id());
            PairDisposition::Direct
        }
        ShardDecision::Split => {
            let request = SplitRequest {
                input_bucket: input.bucket().to_string(),
                r1_key: pair.r1_key,
                r2_key: pair.r2_key,
                pair_key: pair.pair_key.clone(),
                manifest_bucket,
            };
            match sharder.split_pair(&request).await {
                Ok(count) => {
                    // Shard manifests already exist in the store at this
                    // point (synchronous sharder contract).
                    let lane = pair.pair_key.lane_identifier().to_string();
                    let mut set = expected.lock().await;
                    for index in 0..count {
                        set.insert(format!("{lane}_p{index}"));
                    }
                    info!(pair_key = %pair.pair_key, count, "Pair sharded");
                    PairDisposition::Sharded
                }
                Err(e) => {
                    warn!(pair_key = %pair.pair_key, error = %e, "Sharding failed, dropping pair");
                    PairDisposition::Failed
                }
            }
        }
    }
}

async fn combined_size(input: &Storage, pair: &MatchedPair) -> Result<u64> {
    let r1 = input.object_size(&pair.r1_key).await?;
    let r2 = input.object_size(&pair.r2_key).await?;
    Ok(r1 + r2)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GIB: u64 = 1024 * 1024 * 1024;
    const MIB: u64 = 1024 * 1024;

    #[test]
    fn direct_only_strictly_below_threshold() {
        let threshold = 7 * GIB; // 7168 MiB
        assert_eq!(
            ShardDecision::for_size(7167 * MIB, threshold),
            ShardDecision::Direct
        );
        assert_eq!(
            ShardDecision::for_size(7168 * MIB, threshold),
            ShardDecision::Split
        );
        assert_eq!(
            ShardDecision::for_size(7168 * MIB + 1, threshold),
            ShardDecision::Split
        );
    }

    #[test]
    fn six_gib_pair_dispatches_directly() {
        assert_eq!(
            ShardDecision::for_size(6 * GIB, 7 * GIB),
            ShardDecision::Direct
        );
    }

    #[tokio::test]
    async fn expected_jobs_survive_a_live_clone() {
        let expected: Arc<Mutex<BTreeSet<String>>> = Arc::new(Mutex::new(
            ["a_L001_p0".to_string(), "a_L001_p1".to_string()]
                .into_iter()
                .collect(),
        ));
        let outstanding = Arc::clone(&expected);

        let drained = drain_expected(&expected).await;
        assert_eq!(drained.len(), 2);
        assert!(drained.contains("a_L001_p0"));
        assert!(outstanding.lock().await.is_empty());
    }
}
