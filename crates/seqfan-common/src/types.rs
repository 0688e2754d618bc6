//! Domain types shared by the orchestrator and the worker
//!
//! All coordination between the two sides happens through object-store
//! naming conventions, so the key grammar lives here:
//!
//! - manifest key: `{pair_key}_p{shard_index}_input.txt`
//! - output folder: `{output_prefix}/{job_id}/`
//! - completion marker: `{output_prefix}/{job_id}/output.txt`

use crate::error::{Result, SeqfanError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Suffix that marks a manifest object; its creation is the dispatch signal.
pub const MANIFEST_SUFFIX: &str = "_input.txt";

/// File name of the zero-byte completion marker.
pub const MARKER_FILE: &str = "output.txt";

/// Default prefix under which workers publish their outputs.
pub const DEFAULT_OUTPUT_PREFIX: &str = "piscem_output";

/// A fully qualified object-store location, `s3://bucket/key`.
///
/// Manifests carry locators rather than bare keys because the referenced
/// reads may live in a different bucket than the manifest itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    pub bucket: String,
    pub key: String,
}

impl Locator {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Parse an `s3://bucket/key` string.
    pub fn parse(s: &str) -> Result<Self> {
        let rest = s
            .strip_prefix("s3://")
            .ok_or_else(|| SeqfanError::InvalidLocator(format!("missing s3:// scheme: {s}")))?;
        let (bucket, key) = rest
            .split_once('/')
            .ok_or_else(|| SeqfanError::InvalidLocator(format!("missing object key: {s}")))?;
        if bucket.is_empty() || key.is_empty() {
            return Err(SeqfanError::InvalidLocator(format!(
                "empty bucket or key: {s}"
            )));
        }
        Ok(Self::new(bucket, key))
    }

    /// Final path component of the key.
    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// Identifier for one physical sequencing lane: `<base>_L<3-digit-lane>`,
/// possibly with a folder prefix (`run42/sampleA_L001`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PairKey(String);

impl PairKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Folder prefix of the key, empty when the key has no `/`.
    pub fn folder(&self) -> &str {
        match self.0.rsplit_once('/') {
            Some((folder, _)) => folder,
            None => "",
        }
    }

    /// Basename-only lane identifier; job identities are derived from this
    /// so that output folders stay flat regardless of input folder layout.
    pub fn lane_identifier(&self) -> &str {
        match self.0.rsplit_once('/') {
            Some((_, lane)) => lane,
            None => &self.0,
        }
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One complete R1/R2 pair discovered in the input bucket.
#[derive(Debug, Clone)]
pub struct FilePair {
    pub pair_key: PairKey,
    pub r1: Locator,
    pub r2: Locator,
    pub combined_size_bytes: u64,
}

/// One unit of dispatched work: the whole pair (shard 0) or one of its
/// shards. Serialized into exactly one manifest.
#[derive(Debug, Clone)]
pub struct ShardJob {
    pub pair_key: PairKey,
    pub shard_index: u32,
    pub r1: Locator,
    pub r2: Locator,
}

impl ShardJob {
    /// Job identity as tracked by the completion protocol and used as the
    /// output folder name: `{lane}_p{shard_index}`.
    pub fn job_id(&self) -> String {
        format!("{}_p{}", self.pair_key.lane_identifier(), self.shard_index)
    }

    /// Deterministic manifest key. The folder prefix of the pair key is
    /// preserved so manifests sit alongside their source layout.
    pub fn manifest_key(&self) -> String {
        let folder = self.pair_key.folder();
        if folder.is_empty() {
            format!("{}{}", self.job_id(), MANIFEST_SUFFIX)
        } else {
            format!("{}/{}{}", folder, self.job_id(), MANIFEST_SUFFIX)
        }
    }
}

/// The small object naming the two input locators for one job unit.
///
/// Content is two newline-separated locators, R1 then R2 by convention;
/// consumers classify by filename substring, not by position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub r1: Locator,
    pub r2: Locator,
}

impl Manifest {
    pub fn new(r1: Locator, r2: Locator) -> Self {
        Self { r1, r2 }
    }

    pub fn for_job(job: &ShardJob) -> Self {
        Self::new(job.r1.clone(), job.r2.clone())
    }

    /// Serialize to the on-store representation.
    pub fn to_contents(&self) -> String {
        format!("{}\n{}\n", self.r1, self.r2)
    }

    /// Parse manifest contents fetched from the store.
    pub fn parse(key: &str, contents: &str) -> Result<Self> {
        let mut locators = Vec::new();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            locators.push(Locator::parse(line)?);
        }
        match <[Locator; 2]>::try_from(locators) {
            Ok([r1, r2]) => Ok(Self::new(r1, r2)),
            Err(got) => Err(SeqfanError::InvalidManifest {
                key: key.to_string(),
                reason: format!("expected 2 locators, found {}", got.len()),
            }),
        }
    }

    pub fn locators(&self) -> [&Locator; 2] {
        [&self.r1, &self.r2]
    }
}

/// Derive the job identity from a manifest key, the worker-side inverse of
/// [`ShardJob::manifest_key`]. Returns `None` when the key is not a
/// manifest.
pub fn job_id_from_manifest_key(key: &str) -> Option<String> {
    let stem = key.strip_suffix(MANIFEST_SUFFIX)?;
    let base = stem.rsplit('/').next().unwrap_or(stem);
    if base.is_empty() {
        None
    } else {
        Some(base.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locator_round_trip() {
        let loc = Locator::parse("s3://reads-bucket/run42/sampleA_L001_R1_001.fastq.gz").unwrap();
        assert_eq!(loc.bucket, "reads-bucket");
        assert_eq!(loc.key, "run42/sampleA_L001_R1_001.fastq.gz");
        assert_eq!(loc.file_name(), "sampleA_L001_R1_001.fastq.gz");
        assert_eq!(
            loc.to_string(),
            "s3://reads-bucket/run42/sampleA_L001_R1_001.fastq.gz"
        );
    }

    #[test]
    fn locator_rejects_malformed() {
        assert!(Locator::parse("http://bucket/key").is_err());
        assert!(Locator::parse("s3://bucket-only").is_err());
        assert!(Locator::parse("s3:///key").is_err());
    }

    #[test]
    fn pair_key_folder_split() {
        let flat = PairKey::new("sampleA_L001");
        assert_eq!(flat.folder(), "");
        assert_eq!(flat.lane_identifier(), "sampleA_L001");

        let nested = PairKey::new("proj/sub/sampleA_L001");
        assert_eq!(nested.folder(), "proj/sub");
        assert_eq!(nested.lane_identifier(), "sampleA_L001");
    }

    #[test]
    fn shard_job_keys() {
        let job = ShardJob {
            pair_key: PairKey::new("proj/sub/sampleA_L001"),
            shard_index: 0,
            r1: Locator::new("b", "proj/sub/sampleA_L001_R1_001.fastq.gz"),
            r2: Locator::new("b", "proj/sub/sampleA_L001_R2_001.fastq.gz"),
        };
        assert_eq!(job.job_id(), "sampleA_L001_p0");
        assert_eq!(job.manifest_key(), "proj/sub/sampleA_L001_p0_input.txt");

        let flat = ShardJob {
            pair_key: PairKey::new("sampleB_L002"),
            shard_index: 3,
            r1: Locator::new("b", "sampleB_L002_R1_001_p3.fastq.gz"),
            r2: Locator::new("b", "sampleB_L002_R2_001_p3.fastq.gz"),
        };
        assert_eq!(flat.manifest_key(), "sampleB_L002_p3_input.txt");
    }

    #[test]
    fn manifest_round_trip() {
        let manifest = Manifest::new(
            Locator::new("b", "sampleA_L001_R1_001.fastq.gz"),
            Locator::new("b", "sampleA_L001_R2_001.fastq.gz"),
        );
        let parsed = Manifest::parse("sampleA_L001_p0_input.txt", &manifest.to_contents()).unwrap();
        assert_eq!(parsed, manifest);
        assert_eq!(parsed.r1.file_name(), "sampleA_L001_R1_001.fastq.gz");
    }

    #[test]
    fn manifest_rejects_wrong_cardinality() {
        let err = Manifest::parse("k_input.txt", "s3://b/one.fastq.gz\n").unwrap_err();
        assert!(matches!(err, SeqfanError::InvalidManifest { .. }));

        let err = Manifest::parse(
            "k_input.txt",
            "s3://b/1.fastq.gz\ns3://b/2.fastq.gz\ns3://b/3.fastq.gz\n",
        )
        .unwrap_err();
        assert!(matches!(err, SeqfanError::InvalidManifest { .. }));
    }

    #[test]
    fn job_id_from_key() {
        assert_eq!(
            job_id_from_manifest_key("proj/sampleA_L001_p0_input.txt").as_deref(),
            Some("sampleA_L001_p0")
        );
        assert_eq!(
            job_id_from_manifest_key("sampleA_L001_p2_input.txt").as_deref(),
            Some("sampleA_L001_p2")
        );
        assert_eq!(job_id_from_manifest_key("sampleA_L001.fastq.gz"), None);
    }
}
