use crate::metrics::MergeStats;
use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;

/// A contiguous run of addon roots owned by exactly one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkAssignment {
    /// 1-based, matches the worker's position in assignment order.
    pub worker_id: usize,
    pub addons: Vec<Utf8PathBuf>,
}

impl WorkAssignment {
    pub fn len(&self) -> usize {
        self.addons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addons.is_empty()
    }
}

/// A file left uncopied because its destination already existed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictRecord {
    pub source: Utf8PathBuf,
    pub destination: Utf8PathBuf,
}

impl fmt::Display for ConflictRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

/// Any other per-entry failure met while walking or copying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    pub path: Utf8PathBuf,
    pub message: String,
}

impl ErrorRecord {
    pub fn new(path: impl AsRef<Utf8Path>, message: impl Into<String>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Terminal state of a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerStatus {
    /// Every assigned addon was attempted. Per-file failures may still exist.
    Completed,
    /// The worker could not proceed at all.
    Failed { reason: String },
}

impl WorkerStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, WorkerStatus::Failed { .. })
    }
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerStatus::Completed => write!(f, "completed"),
            WorkerStatus::Failed { reason } => write!(f, "failed: {}", reason),
        }
    }
}

/// Everything one worker produced, handed to the coordinator after it exits.
#[derive(Debug, Clone)]
pub struct WorkerResult {
    pub worker_id: usize,
    pub conflicts: Vec<ConflictRecord>,
    pub errors: Vec<ErrorRecord>,
    pub status: WorkerStatus,
    pub stats: MergeStats,
}

impl WorkerResult {
    pub fn new(worker_id: usize) -> Self {
        Self {
            worker_id,
            conflicts: Vec::new(),
            errors: Vec::new(),
            status: WorkerStatus::Completed,
            stats: MergeStats::default(),
        }
    }

    /// Result for a worker that never produced one of its own (e.g. it panicked).
    pub fn failed(worker_id: usize, reason: impl Into<String>) -> Self {
        Self {
            status: WorkerStatus::Failed {
                reason: reason.into(),
            },
            ..Self::new(worker_id)
        }
    }
}

/// Outcome of a whole run, workers in assignment order.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub results: Vec<WorkerResult>,
    pub stats: MergeStats,
}

impl RunReport {
    pub fn from_results(results: Vec<WorkerResult>) -> Self {
        let mut stats = MergeStats::default();
        for result in &results {
            stats.absorb(&result.stats);
        }
        Self { results, stats }
    }

    pub fn worker_count(&self) -> usize {
        self.results.len()
    }

    pub fn failed_workers(&self) -> usize {
        self.results.iter().filter(|r| r.status.is_failed()).count()
    }

    pub fn has_fatal_failures(&self) -> bool {
        self.failed_workers() > 0
    }

    pub fn total_conflicts(&self) -> usize {
        self.results.iter().map(|r| r.conflicts.len()).sum()
    }

    pub fn total_errors(&self) -> usize {
        self.results.iter().map(|r| r.errors.len()).sum()
    }
}
