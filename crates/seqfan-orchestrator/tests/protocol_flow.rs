//! End-to-end protocol flow over the naming conventions
//!
//! Exercises the whole coordination grammar without an object store: a
//! listed pair becomes one direct-dispatch job, its manifest round-trips,
//! and the job's completion marker is recognized by the tracker.

use seqfan_common::types::{Locator, Manifest, ShardJob};
use seqfan_orchestrator::dispatch::ShardDecision;
use seqfan_orchestrator::pairing::match_pairs;
use seqfan_orchestrator::tracker::completed_jobs;
use std::collections::BTreeSet;

const GIB: u64 = 1024 * 1024 * 1024;

#[test]
fn six_gib_pair_flows_to_completion() {
    // Discovery: both read sides of one lane present in the listing.
    let pairing = match_pairs([
        "sampleA_L001_R1_001.fastq.gz",
        "sampleA_L001_R2_001.fastq.gz",
        "sampleA_L001_I1_001.fastq.gz",
    ]);
    assert_eq!(pairing.pairs.len(), 1);
    let pair = &pairing.pairs[0];

    // Size gate: 3 GiB + 3 GiB stays under the 7 GiB threshold.
    assert_eq!(
        ShardDecision::for_size(6 * GIB, 7 * GIB),
        ShardDecision::Direct
    );

    // Dispatch: one shard job, index 0, deterministic keys.
    let job = ShardJob {
        pair_key: pair.pair_key.clone(),
        shard_index: 0,
        r1: Locator::new("reads", &pair.r1_key),
        r2: Locator::new("reads", &pair.r2_key),
    };
    assert_eq!(job.job_id(), "sampleA_L001_p0");
    assert_eq!(job.manifest_key(), "sampleA_L001_p0_input.txt");

    // The manifest a worker would fetch parses back to the same locators.
    let manifest = Manifest::for_job(&job);
    let parsed = Manifest::parse(&job.manifest_key(), &manifest.to_contents()).unwrap();
    assert_eq!(parsed.r1.to_string(), "s3://reads/sampleA_L001_R1_001.fastq.gz");
    assert_eq!(parsed.r2.to_string(), "s3://reads/sampleA_L001_R2_001.fastq.gz");

    // Completion: the worker's marker key satisfies the expected set.
    let expected: BTreeSet<String> = [job.job_id()].into_iter().collect();
    let listed = [
        "piscem_output/sampleA_L001_p0/split_map_output_transcriptome/map.rad",
        "piscem_output/sampleA_L001_p0/output.txt",
    ];
    let completed = completed_jobs(listed.iter().copied(), "piscem_output", &expected);
    assert_eq!(completed, expected);
}
