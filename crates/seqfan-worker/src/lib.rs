//! Seqfan Worker Library
//!
//! One invocation processes one manifest-creation event: download the
//! manifest's two read files, run the external aligner, upload the results,
//! and finish with the zero-byte completion marker. Workers are stateless;
//! any number may run concurrently with no coordination beyond distinct
//! deterministic output keys.

pub mod aligner;
pub mod config;
pub mod event;
pub mod handler;

pub use config::WorkerConfig;
pub use event::ManifestEvent;
pub use handler::{handle, HandlerOutcome};
