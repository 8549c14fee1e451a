use super::merge::{MergeError, MergeWorker};
use super::partition::partition;
use super::report::{ReportPaths, write_reports};
use crate::events::{EventBus, MergeEvent};
use crate::models::{MergeOptions, OutputLayout, RunReport, WorkAssignment, WorkerResult};
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinError;

/// Launches one worker per assignment and waits for all of them.
///
/// Each worker runs on its own blocking thread via
/// [`tokio::task::spawn_blocking`], so workers execute in parallel and never
/// stall the async runtime. There is no cancellation: once started, every
/// worker runs to completion regardless of how its siblings fare.
#[derive(Debug, Clone)]
pub struct MergeCoordinator {
    options: Arc<MergeOptions>,
    events: Option<EventBus>,
}

impl MergeCoordinator {
    pub fn new(options: MergeOptions) -> Self {
        Self {
            options: Arc::new(options),
            events: None,
        }
    }

    /// Publish progress on `events` for the lifetime of this coordinator
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn options(&self) -> &MergeOptions {
        &self.options
    }

    fn emit(&self, event: MergeEvent) {
        if let Some(events) = &self.events {
            events.emit(event);
        }
    }

    /// Partition `addons` and merge them.
    pub async fn merge(
        &self,
        addons: &[Utf8PathBuf],
        max_workers: usize,
        per_worker_capacity: usize,
    ) -> RunReport {
        let assignments = partition(addons, max_workers, per_worker_capacity);
        self.run_all(assignments).await
    }

    /// Run every assignment concurrently and return once all have terminated.
    ///
    /// Results come back in assignment order, whatever order the workers
    /// actually finish in. A worker that panics is reported as failed; it
    /// does not affect the others. Zero assignments complete immediately.
    pub async fn run_all(&self, assignments: Vec<WorkAssignment>) -> RunReport {
        self.run_with(assignments, MergeWorker::run).await
    }

    /// [`run_all`](Self::run_all) with the per-worker job supplied by the caller.
    async fn run_with<F>(&self, assignments: Vec<WorkAssignment>, job: F) -> RunReport
    where
        F: FnOnce(MergeWorker) -> WorkerResult + Send + Copy + 'static,
    {
        let start = Instant::now();
        let addon_count: usize = assignments.iter().map(WorkAssignment::len).sum();

        if self.options.layout == OutputLayout::Nested {
            for name in find_name_collisions(&assignments) {
                tracing::warn!(
                    "Multiple addons share the name '{}'; they will be written into the same output folder concurrently",
                    name
                );
            }
        }

        tracing::info!("Starting up {} worker(s)...", assignments.len());
        self.emit(MergeEvent::RunStarted {
            workers: assignments.len(),
            addons: addon_count,
        });

        let handles: Vec<_> = assignments
            .into_iter()
            .map(|assignment| {
                let id = assignment.worker_id;
                let mut worker = MergeWorker::new(assignment, Arc::clone(&self.options));
                if let Some(events) = &self.events {
                    worker = worker.with_events(events.clone());
                }
                (id, tokio::task::spawn_blocking(move || job(worker)))
            })
            .collect();

        // Awaiting in order is still a full barrier: nothing returns until
        // every handle has resolved
        let mut results = Vec::with_capacity(handles.len());
        for (id, handle) in handles {
            let joined = handle.await;
            let panicked = joined.is_err();
            let result = join_result(id, joined);
            if panicked {
                // The worker never got to announce its own end
                self.emit(MergeEvent::WorkerFinished {
                    worker: id,
                    status: result.status.clone(),
                });
            }
            results.push(result);
        }

        let mut report = RunReport::from_results(results);
        report.stats.elapsed = start.elapsed();

        self.emit(MergeEvent::RunFinished {
            failed_workers: report.failed_workers(),
        });
        tracing::info!(
            "Finished merging {} addons into {}!",
            addon_count,
            self.options.output_root
        );

        report
    }

    /// Write the consolidated reports for `report` if logging is enabled.
    ///
    /// Returns `Ok(None)` without touching `log_dir` when it is not.
    pub fn write_reports(
        &self,
        log_dir: &Utf8Path,
        report: &RunReport,
    ) -> Result<Option<ReportPaths>, MergeError> {
        if !self.options.logging {
            return Ok(None);
        }
        tracing::info!("Writing logs to {}...", log_dir);
        write_reports(log_dir, &report.results).map(Some)
    }
}

/// Maps a joined worker task to its result; a panic becomes a failed worker.
fn join_result(id: usize, joined: Result<WorkerResult, JoinError>) -> WorkerResult {
    match joined {
        Ok(result) => result,
        Err(join_error) => {
            let err = MergeError::WorkerPanicked(id);
            tracing::error!("{}: {}", err, join_error);
            WorkerResult::failed(id, err.to_string())
        }
    }
}

/// Addon directory names that occur more than once across `assignments`.
///
/// In the nested layout such addons share a top-level output folder and
/// their workers would race on it. This is reported, not resolved.
pub fn find_name_collisions(assignments: &[WorkAssignment]) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for name in assignments
        .iter()
        .flat_map(|a| a.addons.iter())
        .filter_map(|addon| addon.file_name())
    {
        *counts.entry(name).or_default() += 1;
    }

    let mut collisions: Vec<String> = counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(name, _)| name.to_string())
        .collect();
    collisions.sort();
    collisions
}
