//! Services module - the merge engine.
//!
//! Control flow of a run, leaves first:
//!
//! 1. [`discover_addons`] lists the candidate addon directories
//! 2. [`filter_addons`] drops candidates named in the ignore list
//! 3. [`partition`] splits the survivors into contiguous per-worker assignments
//! 4. [`MergeCoordinator::run_all`] launches one [`MergeWorker`] per assignment and
//!    waits for every one of them
//! 5. [`write_reports`] consolidates conflicts and errors when logging is enabled
//!
//! # Usage Example
//!
//! ```ignore
//! use addon_merger::models::MergeOptions;
//! use addon_merger::services::{discover_addons, filter_addons, write_reports, MergeCoordinator};
//!
//! let addons = filter_addons(&ignore_list, &discover_addons(&addons_root)?);
//! let coordinator = MergeCoordinator::new(MergeOptions::new(&output_root).with_logging(true));
//! let report = coordinator.merge(&addons, 4, 20).await;
//! write_reports(&log_dir, &report.results)?;
//! ```
//!
//! # Concurrency
//!
//! The output tree is the only shared mutable resource. Workers own disjoint
//! addons, and in the nested layout each addon has its own top-level output
//! folder, so no locking is needed. Two addons with the same directory name
//! would share that folder; the coordinator warns about this but does not
//! prevent it. Directory creation tolerates concurrent creators.
//! No-overwrite copies use exclusive create, so a collision yields conflict
//! records. Overwriting copies are staged beside the destination and renamed
//! over it: which writer wins is unspecified, but the result is always one
//! whole source file.

pub mod coordinator;
pub mod filter;
pub mod merge;
pub mod partition;
pub mod report;

pub use coordinator::{MergeCoordinator, find_name_collisions};
pub use filter::{discover_addons, filter_addons};
pub use merge::{MergeError, MergeWorker, addon_destination};
pub use partition::{effective_capacity, partition, worker_count};
pub use report::{ReportKind, ReportPaths, render_report, write_reports};
