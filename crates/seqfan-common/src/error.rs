//! Error types for seqfan

use thiserror::Error;

/// Result type alias for seqfan operations
pub type Result<T> = std::result::Result<T, SeqfanError>;

/// Main error type for seqfan
#[derive(Error, Debug)]
pub enum SeqfanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid locator: {0}")]
    InvalidLocator(String),

    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error("Invalid manifest {key}: {reason}")]
    InvalidManifest { key: String, reason: String },

    #[error("Missing {read_type} files for job {job_id}")]
    MissingReadSide { job_id: String, read_type: String },

    #[error("External process `{program}` failed: {detail}")]
    ExternalProcess { program: String, detail: String },

    #[error("Deadline exceeded waiting for completion: {observed} of {expected} markers after {waited_secs}s")]
    DeadlineExceeded {
        observed: usize,
        expected: usize,
        waited_secs: u64,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SeqfanError {
    /// True for outcomes that should map to a validation (400-equivalent)
    /// status rather than a processing failure.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SeqfanError::InvalidEvent(_)
                | SeqfanError::InvalidLocator(_)
                | SeqfanError::InvalidManifest { .. }
                | SeqfanError::MissingReadSide { .. }
        )
    }
}
