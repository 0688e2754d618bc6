//! Seqfan Common Library
//!
//! Shared types, utilities, and error handling for the seqfan workspace.
//!
//! # Overview
//!
//! This crate provides the functionality used by both the orchestrator and
//! the worker:
//!
//! - **Error Handling**: the shared [`SeqfanError`] and result type
//! - **Logging**: `tracing` initialization used by every binary
//! - **Types**: storage locators, pair keys, shard jobs, and manifests
//! - **Storage**: the S3 client wrapper both sides coordinate through

pub mod error;
pub mod logging;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use error::{Result, SeqfanError};
pub use storage::Storage;
pub use types::{Locator, Manifest, PairKey, ShardJob};
