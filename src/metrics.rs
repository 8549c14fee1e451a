// Merge statistics
//
// Plain counters owned by a single worker while it runs. The coordinator sums
// them into the run report after the join barrier, so no atomics are needed.

use std::time::Duration;

/// Counters collected by one worker, or summed across a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Addon roots fully walked
    pub addons_merged: usize,

    /// Files written to the output tree
    pub files_copied: usize,

    /// Bytes written to the output tree
    pub bytes_copied: u64,

    /// Source directories read
    pub directories_visited: usize,

    /// Files left alone because the destination already existed
    pub conflicts: usize,

    /// Per-entry failures of any other kind
    pub errors: usize,

    /// Wall time spent
    pub elapsed: Duration,
}

impl MergeStats {
    pub fn record_file_copied(&mut self, bytes: u64) {
        self.files_copied += 1;
        self.bytes_copied += bytes;
    }

    pub fn record_directory_visited(&mut self) {
        self.directories_visited += 1;
    }

    pub fn record_conflict(&mut self) {
        self.conflicts += 1;
    }

    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    pub fn record_addon_merged(&mut self) {
        self.addons_merged += 1;
    }

    /// Add another worker's counters into these.
    ///
    /// Workers run concurrently, so the elapsed time keeps the longest one
    /// rather than the sum.
    pub fn absorb(&mut self, other: &MergeStats) {
        self.addons_merged += other.addons_merged;
        self.files_copied += other.files_copied;
        self.bytes_copied += other.bytes_copied;
        self.directories_visited += other.directories_visited;
        self.conflicts += other.conflicts;
        self.errors += other.errors;
        self.elapsed = self.elapsed.max(other.elapsed);
    }

    /// Copy throughput in MiB/s, 0 when nothing was timed.
    pub fn throughput_mib_s(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.bytes_copied as f64 / (1024.0 * 1024.0) / secs
        } else {
            0.0
        }
    }

    /// Log a summary of the counters
    pub fn log_summary(&self) {
        tracing::info!("=== Merge Summary ===");
        tracing::info!(
            "Addons: {} merged, directories visited: {}",
            self.addons_merged,
            self.directories_visited
        );
        tracing::info!(
            "Files: {} copied ({:.2} MiB), {} conflicts, {} errors",
            self.files_copied,
            self.bytes_copied as f64 / (1024.0 * 1024.0),
            self.conflicts,
            self.errors
        );
        tracing::info!(
            "Elapsed: {:.2}s ({:.2} MiB/s)",
            self.elapsed.as_secs_f64(),
            self.throughput_mib_s()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_creation() {
        let stats = MergeStats::default();
        assert_eq!(stats.files_copied, 0);
        assert_eq!(stats.bytes_copied, 0);
    }

    #[test]
    fn test_record_operations() {
        let mut stats = MergeStats::default();

        stats.record_file_copied(100);
        stats.record_file_copied(50);
        stats.record_conflict();
        stats.record_error();
        stats.record_directory_visited();
        stats.record_addon_merged();

        assert_eq!(stats.files_copied, 2);
        assert_eq!(stats.bytes_copied, 150);
        assert_eq!(stats.conflicts, 1);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.directories_visited, 1);
        assert_eq!(stats.addons_merged, 1);
    }

    #[test]
    fn test_absorb_sums_counters_and_keeps_longest_time() {
        let mut total = MergeStats {
            files_copied: 3,
            elapsed: Duration::from_millis(200),
            ..Default::default()
        };
        let other = MergeStats {
            files_copied: 2,
            conflicts: 4,
            elapsed: Duration::from_millis(500),
            ..Default::default()
        };

        total.absorb(&other);

        assert_eq!(total.files_copied, 5);
        assert_eq!(total.conflicts, 4);
        assert_eq!(total.elapsed, Duration::from_millis(500));
    }

    #[test]
    fn test_throughput_without_time() {
        let stats = MergeStats {
            bytes_copied: 1024,
            ..Default::default()
        };
        assert_eq!(stats.throughput_mib_s(), 0.0);
    }

    #[test]
    fn test_throughput() {
        let stats = MergeStats {
            bytes_copied: 2 * 1024 * 1024,
            elapsed: Duration::from_secs(2),
            ..Default::default()
        };
        assert_eq!(stats.throughput_mib_s(), 1.0);
    }
}
