//! Data models for the addon merger.
//!
//! - [`MergeSettings`]: persisted defaults loaded from `settings.yaml`
//! - [`IgnoreList`]: directory names excluded from merging, loaded from `ignore.yaml`
//! - [`MergeOptions`]: the immutable per-run configuration every worker reads
//! - [`WorkAssignment`]: the contiguous slice of addons a single worker owns
//! - [`WorkerResult`] / [`RunReport`]: conflicts, errors and status produced by the workers
//!
//! # Ownership
//!
//! Assignments and options are computed once per run and never mutated.
//! A [`WorkerResult`] belongs to its worker until the coordinator joins it,
//! so none of these types need interior locking.

pub mod config;
pub mod records;

pub use config::{
    DEFAULT_ADDONS_PER_WORKER, DEFAULT_LOG_DIR, DEFAULT_MERGE_DIR, IgnoreList, MergeOptions,
    MergeSettings, OutputLayout, default_max_workers,
};
pub use records::{
    ConflictRecord, ErrorRecord, RunReport, WorkAssignment, WorkerResult, WorkerStatus,
};
