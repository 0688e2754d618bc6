//! Completion tracking
//!
//! A worker signals success by writing a zero-byte marker as the last
//! object in its output folder. The tracker repeatedly lists the output
//! namespace and matches discovered markers against the expected job set;
//! marker existence is the only signal, no payload is ever read.

use async_trait::async_trait;
use seqfan_common::types::MARKER_FILE;
use seqfan_common::{Result, SeqfanError, Storage};
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{info, warn};

/// One full paginated listing pass over the output namespace.
#[async_trait]
pub trait MarkerSource: Send + Sync {
    async fn list_output_keys(&self) -> Result<Vec<String>>;
}

/// The output bucket scoped to the worker output prefix.
pub struct OutputNamespace {
    storage: Storage,
    prefix: String,
}

impl OutputNamespace {
    pub fn new(storage: Storage, prefix: impl Into<String>) -> Self {
        Self {
            storage,
            prefix: prefix.into(),
        }
    }
}

#[async_trait]
impl MarkerSource for OutputNamespace {
    async fn list_output_keys(&self) -> Result<Vec<String>> {
        let entries = self
            .storage
            .list_objects(&format!("{}/", self.prefix))
            .await
            .map_err(|e| SeqfanError::Storage(e.to_string()))?;
        Ok(entries.into_iter().map(|e| e.key).collect())
    }
}

/// Extract the job folders whose completion marker is present.
///
/// A marker key has the exact shape `{prefix}/{job_id}/output.txt`; the
/// folder must be in the expected set and the file-name component must be
/// the marker itself.
pub fn completed_jobs<'a>(
    keys: impl IntoIterator<Item = &'a str>,
    prefix: &str,
    expected: &BTreeSet<String>,
) -> BTreeSet<String> {
    let mut completed = BTreeSet::new();
    for key in keys {
        let Some(rest) = key.strip_prefix(prefix).and_then(|r| r.strip_prefix('/')) else {
            continue;
        };
        let Some((folder, file)) = rest.split_once('/') else {
            continue;
        };
        if file == MARKER_FILE && expected.contains(folder) {
            completed.insert(folder.to_string());
        }
    }
    completed
}

/// Polls the output namespace until every expected job has completed.
pub struct CompletionTracker<S> {
    source: S,
    prefix: String,
    interval: Duration,
    deadline: Option<Duration>,
}

impl<S: MarkerSource> CompletionTracker<S> {
    pub fn new(
        source: S,
        prefix: impl Into<String>,
        interval: Duration,
        deadline: Option<Duration>,
    ) -> Self {
        Self {
            source,
            prefix: prefix.into(),
            interval,
            deadline,
        }
    }

    /// Block until a marker has been observed for every job in `expected`,
    /// returning the observed set. With a deadline configured, "still
    /// waiting" becomes an explicit [`SeqfanError::DeadlineExceeded`]
    /// instead of an unbounded wait.
    pub async fn wait_for(&self, expected: &BTreeSet<String>) -> Result<BTreeSet<String>> {
        let started = tokio::time::Instant::now();
        let mut observed: BTreeSet<String> = BTreeSet::new();

        loop {
            match self.source.list_output_keys().await {
                Ok(keys) => {
                    observed.append(&mut completed_jobs(
                        keys.iter().map(String::as_str),
                        &self.prefix,
                        expected,
                    ));
                }
                // The poll loop is itself the retry; a failed pass costs
                // one interval, not the run.
                Err(e) => warn!(error = %e, "Output listing failed, will retry"),
            }

            info!(
                "Observed markers for {} of {} expected jobs",
                observed.len(),
                expected.len()
            );

            if observed.len() >= expected.len() {
                return Ok(observed);
            }

            if let Some(deadline) = self.deadline {
                if started.elapsed() + self.interval > deadline {
                    return Err(SeqfanError::DeadlineExceeded {
                        observed: observed.len(),
                        expected: expected.len(),
                        waited_secs: started.elapsed().as_secs(),
                    });
                }
            }

            tokio::time::sleep(self.interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    fn expected(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn marker_extraction_matches_exact_shape() {
        let expected = expected(&["sampleA_L001_p0", "sampleA_L001_p1"]);
        let keys = [
            "piscem_output/sampleA_L001_p0/output.txt",
            "piscem_output/sampleA_L001_p0/split_map_output.rad",
            "piscem_output/sampleA_L001_p1/partial.rad", // no marker yet
            "piscem_output/unknown_L009_p0/output.txt",  // not expected
            "other_prefix/sampleA_L001_p1/output.txt",   // wrong namespace
            "piscem_output/sampleA_L001_p0",             // no file component
        ];
        let completed = completed_jobs(keys.iter().copied(), "piscem_output", &expected);
        assert_eq!(completed, self::expected(&["sampleA_L001_p0"]));
    }

    /// Scripted source: each poll pass pops the next listing; the last
    /// listing repeats forever.
    struct ScriptedSource {
        passes: Arc<Mutex<Vec<Vec<String>>>>,
    }

    impl ScriptedSource {
        fn new(passes: Vec<Vec<&str>>) -> Self {
            Self {
                passes: Arc::new(Mutex::new(
                    passes
                        .into_iter()
                        .map(|p| p.into_iter().map(String::from).collect())
                        .collect(),
                )),
            }
        }
    }

    #[async_trait]
    impl MarkerSource for ScriptedSource {
        async fn list_output_keys(&self) -> Result<Vec<String>> {
            let mut passes = self.passes.lock().await;
            if passes.len() > 1 {
                Ok(passes.remove(0))
            } else {
                Ok(passes.first().cloned().unwrap_or_default())
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unblocks_only_when_all_markers_present() {
        let expected = expected(&["a_L001_p0", "a_L001_p1", "a_L001_p2"]);
        let source = ScriptedSource::new(vec![
            vec![
                "piscem_output/a_L001_p0/output.txt",
                "piscem_output/a_L001_p1/output.txt",
            ],
            // Second pass still missing the third marker.
            vec![],
            vec!["piscem_output/a_L001_p2/output.txt"],
        ]);
        let tracker = CompletionTracker::new(
            source,
            "piscem_output",
            Duration::from_secs(30),
            None,
        );

        let started = tokio::time::Instant::now();
        let observed = tracker.wait_for(&expected).await.unwrap();
        assert_eq!(observed, expected);
        // Two sleeps: unblocked within one interval of the final marker.
        assert_eq!(started.elapsed().as_secs(), 60);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_expected_set_returns_immediately() {
        let tracker = CompletionTracker::new(
            ScriptedSource::new(vec![vec![]]),
            "piscem_output",
            Duration::from_secs(30),
            None,
        );
        let observed = tracker.wait_for(&BTreeSet::new()).await.unwrap();
        assert!(observed.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_converts_waiting_into_error() {
        let expected = expected(&["a_L001_p0"]);
        let tracker = CompletionTracker::new(
            ScriptedSource::new(vec![vec![]]),
            "piscem_output",
            Duration::from_secs(30),
            Some(Duration::from_secs(45)),
        );

        let err = tracker.wait_for(&expected).await.unwrap_err();
        match err {
            SeqfanError::DeadlineExceeded {
                observed, expected, ..
            } => {
                assert_eq!(observed, 0);
                assert_eq!(expected, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
