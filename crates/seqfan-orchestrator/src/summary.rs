//! Machine-readable run summary
//!
//! Printed as one JSON object on stdout at the end of a run; all other
//! output goes through `tracing`.

use crate::dispatch::DispatchOutcome;
use crate::pairing::PairingOutcome;
use crate::retrieve::RetrievalReport;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub elapsed_secs: u64,
    pub pairs_found: usize,
    pub incomplete_pairs: usize,
    pub pairs_direct: usize,
    pub pairs_sharded: usize,
    pub pairs_failed: usize,
    pub jobs_dispatched: usize,
    pub jobs_completed: usize,
    pub files_downloaded: usize,
    pub files_skipped: usize,
    pub retrieval_failures: Vec<String>,
}

impl RunSummary {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            elapsed_secs: 0,
            pairs_found: 0,
            incomplete_pairs: 0,
            pairs_direct: 0,
            pairs_sharded: 0,
            pairs_failed: 0,
            jobs_dispatched: 0,
            jobs_completed: 0,
            files_downloaded: 0,
            files_skipped: 0,
            retrieval_failures: Vec::new(),
        }
    }

    pub fn record_pairing(&mut self, pairing: &PairingOutcome) {
        self.pairs_found = pairing.pairs.len();
        self.incomplete_pairs = pairing.incomplete.len();
    }

    pub fn record_dispatch(&mut self, dispatch: &DispatchOutcome) {
        self.pairs_direct = dispatch.pairs_direct;
        self.pairs_sharded = dispatch.pairs_sharded;
        self.pairs_failed = dispatch.pairs_failed;
        self.jobs_dispatched = dispatch.expected_jobs.len();
    }

    pub fn record_retrieval(&mut self, report: &RetrievalReport) {
        self.files_downloaded = report.downloaded;
        self.files_skipped = report.skipped;
        self.retrieval_failures = report
            .failures
            .iter()
            .map(|f| format!("{}: {}", f.key, f.error))
            .collect();
    }

    pub fn finish(&mut self) {
        self.elapsed_secs = (Utc::now() - self.started_at).num_seconds().max(0) as u64;
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_serializes_counts() {
        let mut summary = RunSummary::new(Utc::now());
        summary.pairs_found = 3;
        summary.jobs_dispatched = 5;
        summary.jobs_completed = 5;
        let json = summary.to_json().unwrap();
        assert!(json.contains("\"pairs_found\": 3"));
        assert!(json.contains("\"jobs_dispatched\": 5"));
        assert!(json.contains("\"retrieval_failures\": []"));
    }
}
