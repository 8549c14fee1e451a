//! Splits the addon list into per-worker assignments.

use crate::models::WorkAssignment;
use camino::Utf8PathBuf;

/// Number of workers to start for `addon_count` addons.
///
/// `min(ceil(n / capacity), max_workers)`, at least 1 for a non-empty list
/// and 0 for an empty one. Zero limits are treated as 1.
pub fn worker_count(addon_count: usize, max_workers: usize, per_worker_capacity: usize) -> usize {
    if addon_count == 0 {
        return 0;
    }
    let capacity = per_worker_capacity.max(1);
    addon_count.div_ceil(capacity).min(max_workers.max(1)).max(1)
}

/// Addons actually handed to each worker.
///
/// `max(ceil(n / workers), capacity)`. When the worker ceiling is hit this grows
/// past the nominal capacity so nothing is dropped; when addons are few it
/// stays at the nominal capacity even if that leaves a short last worker.
pub fn effective_capacity(addon_count: usize, workers: usize, per_worker_capacity: usize) -> usize {
    let capacity = per_worker_capacity.max(1);
    if workers == 0 {
        return capacity;
    }
    addon_count.div_ceil(workers).max(capacity)
}

/// Splits `addons` into contiguous, order-preserving, non-empty assignments.
///
/// At most `max_workers` assignments are produced; the last one may be
/// shorter than the others. An empty input produces no assignments.
pub fn partition(
    addons: &[Utf8PathBuf],
    max_workers: usize,
    per_worker_capacity: usize,
) -> Vec<WorkAssignment> {
    let workers = worker_count(addons.len(), max_workers, per_worker_capacity);
    if workers == 0 {
        return Vec::new();
    }
    let capacity = effective_capacity(addons.len(), workers, per_worker_capacity);

    // `chunks` never yields an empty trailing slice, so a worker is only
    // created for a run that actually has addons in it
    let assignments: Vec<WorkAssignment> = addons
        .chunks(capacity)
        .enumerate()
        .map(|(index, chunk)| WorkAssignment {
            worker_id: index + 1,
            addons: chunk.to_vec(),
        })
        .collect();

    tracing::debug!(
        "Partitioned {} addons into {} assignment(s) of up to {}",
        addons.len(),
        assignments.len(),
        capacity
    );

    assignments
}
