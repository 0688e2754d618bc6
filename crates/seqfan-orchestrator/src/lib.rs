//! Seqfan Orchestrator Library
//!
//! Drives one processing run end to end against an object store:
//!
//! - **Pairing**: discover R1/R2 read pairs in the input bucket
//! - **Dispatch**: size-gate each pair, shard oversized ones, publish one
//!   manifest per job unit (the manifest write is the dispatch signal)
//! - **Tracking**: poll the output bucket until every expected job has
//!   produced its completion marker
//! - **Retrieval**: bulk-download all completed output folders
//!
//! There is no scheduler and no job database; listings, deterministic key
//! names, and polling are the entire coordination protocol.

pub mod config;
pub mod dispatch;
pub mod pairing;
pub mod retrieve;
pub mod run;
pub mod sharder;
pub mod summary;
pub mod tracker;

pub use config::RunConfig;
pub use run::{run, RunOutcome};
pub use summary::RunSummary;

use clap::Parser;
use std::path::PathBuf;

/// Seqfan - fan paired-end read mapping out over stateless workers
#[derive(Parser, Debug)]
#[command(name = "seqfan")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// AWS region for all buckets
    #[arg(long, env = "AWS_REGION")]
    pub region: String,

    /// Bucket holding the input read files
    #[arg(long)]
    pub input_bucket: String,

    /// Bucket receiving per-job manifests (worker trigger namespace)
    #[arg(long)]
    pub manifest_bucket: String,

    /// Bucket the workers publish outputs and markers into
    #[arg(long)]
    pub output_bucket: String,

    /// Local directory to mirror completed outputs into
    #[arg(long)]
    pub dest_dir: PathBuf,

    /// Seconds between completion-polling passes
    #[arg(long, default_value_t = 30)]
    pub polling_interval: u64,

    /// Give up waiting for completion after this many seconds
    #[arg(long)]
    pub wait_timeout: Option<u64>,

    /// Concurrent store operations in the dispatch and retrieval pools
    #[arg(long, default_value_t = 20)]
    pub concurrency: usize,

    /// Combined pair size (GiB) at or above which a pair is sharded
    #[arg(long, default_value_t = 7)]
    pub size_threshold_gib: u64,

    /// Program invoked to split an oversized pair into shard manifests
    #[arg(long, default_value = "split-and-upload")]
    pub sharder_cmd: PathBuf,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}
