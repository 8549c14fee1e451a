//! Consolidated conflict and error reports.
//!
//! After every worker has been joined, each worker's records are written
//! under a `[Worker N]` header, in assignment order, into `conflicts.log` and
//! `errors.log`. A worker with nothing to report gets a single sentinel line.
//!
//! Each report is staged in a temporary file next to its final path and
//! persisted over it, so a failed write leaves neither a partial report nor
//! a stray temporary file behind.

use super::merge::MergeError;
use crate::models::{WorkerResult, WorkerStatus};
use camino::{Utf8Path, Utf8PathBuf};
use std::fmt::{self, Write as _};
use std::fs;
use std::io::Write as _;
use tempfile::NamedTempFile;

/// Which report to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Conflicts,
    Errors,
}

impl ReportKind {
    pub fn file_name(self) -> &'static str {
        match self {
            ReportKind::Conflicts => "conflicts.log",
            ReportKind::Errors => "errors.log",
        }
    }

    pub fn sentinel(self) -> &'static str {
        match self {
            ReportKind::Conflicts => "No Conflicts!",
            ReportKind::Errors => "No Errors!",
        }
    }
}

/// Paths of the written reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub conflicts: Utf8PathBuf,
    pub errors: Utf8PathBuf,
}

/// Render one report for `results`, which must be in assignment order.
pub fn render_report(kind: ReportKind, results: &[WorkerResult]) -> String {
    let mut out = String::new();

    for result in results {
        let _ = writeln!(out, "[Worker {}]", result.worker_id);

        let mut wrote_any = false;
        match kind {
            ReportKind::Conflicts => {
                for conflict in &result.conflicts {
                    push_record(&mut out, conflict);
                    wrote_any = true;
                }
            }
            ReportKind::Errors => {
                if let WorkerStatus::Failed { reason } = &result.status {
                    push_record(&mut out, format_args!("FATAL: {}", reason));
                    wrote_any = true;
                }
                for error in &result.errors {
                    push_record(&mut out, error);
                    wrote_any = true;
                }
            }
        }

        if !wrote_any {
            let _ = writeln!(out, "{}", kind.sentinel());
        }
    }

    out
}

/// Appends `record` as exactly one line.
///
/// File names may legally contain line breaks; they are written escaped.
fn push_record(out: &mut String, record: impl fmt::Display) {
    let text = record.to_string();
    if text.contains(['\n', '\r']) {
        out.push_str(&text.replace('\n', "\\n").replace('\r', "\\r"));
    } else {
        out.push_str(&text);
    }
    out.push('\n');
}

/// Write `conflicts.log` and `errors.log` into `log_dir`, creating it if needed.
pub fn write_reports(
    log_dir: &Utf8Path,
    results: &[WorkerResult],
) -> Result<ReportPaths, MergeError> {
    fs::create_dir_all(log_dir).map_err(|source| MergeError::Report {
        path: log_dir.to_path_buf(),
        source,
    })?;

    let conflicts = log_dir.join(ReportKind::Conflicts.file_name());
    write_atomically(&conflicts, &render_report(ReportKind::Conflicts, results))?;

    let errors = log_dir.join(ReportKind::Errors.file_name());
    write_atomically(&errors, &render_report(ReportKind::Errors, results))?;

    tracing::info!("Wrote merge reports to {} and {}", conflicts, errors);
    Ok(ReportPaths { conflicts, errors })
}

fn write_atomically(path: &Utf8Path, contents: &str) -> Result<(), MergeError> {
    let report_error = |source| MergeError::Report {
        path: path.to_path_buf(),
        source,
    };
    let dir = path.parent().unwrap_or(Utf8Path::new("."));

    // The temp file deletes itself on drop if we bail out before persisting
    let mut staged = NamedTempFile::new_in(dir).map_err(report_error)?;
    staged.write_all(contents.as_bytes()).map_err(report_error)?;
    staged.flush().map_err(report_error)?;
    staged
        .persist(path)
        .map_err(|e| report_error(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConflictRecord, ErrorRecord};
    use tempfile::TempDir;

    fn with_conflict(worker_id: usize, source: &str) -> WorkerResult {
        let mut result = WorkerResult::new(worker_id);
        result.conflicts.push(ConflictRecord {
            source: Utf8PathBuf::from(source),
            destination: Utf8PathBuf::from("/out/x"),
        });
        result
    }

    #[test]
    fn test_render_conflicts_with_sentinel() {
        let results = vec![
            with_conflict(1, "/addons/a/x.lua"),
            WorkerResult::new(2),
        ];

        let report = render_report(ReportKind::Conflicts, &results);

        assert_eq!(
            report,
            "[Worker 1]\n/addons/a/x.lua\n[Worker 2]\nNo Conflicts!\n"
        );
    }

    #[test]
    fn test_render_errors_one_line_per_record() {
        let mut result = WorkerResult::new(1);
        result.errors.push(ErrorRecord::new("/a", "denied"));
        result.errors.push(ErrorRecord::new("/b", "too long"));

        let report = render_report(ReportKind::Errors, &[result]);

        assert_eq!(report, "[Worker 1]\n/a: denied\n/b: too long\n");
    }

    #[test]
    fn test_line_breaks_in_paths_stay_on_one_line() {
        let mut result = with_conflict(1, "/addons/a/evil\nname.lua");
        result.errors.push(ErrorRecord::new("/addons/a/cr\rname", "denied"));

        let conflicts = render_report(ReportKind::Conflicts, std::slice::from_ref(&result));
        let errors = render_report(ReportKind::Errors, &[result]);

        assert_eq!(conflicts, "[Worker 1]\n/addons/a/evil\\nname.lua\n");
        assert_eq!(errors, "[Worker 1]\n/addons/a/cr\\rname: denied\n");
    }

    #[test]
    fn test_fatal_worker_has_no_error_sentinel() {
        let results = vec![WorkerResult::failed(1, "cannot create output")];

        let errors = render_report(ReportKind::Errors, &results);
        let conflicts = render_report(ReportKind::Conflicts, &results);

        assert_eq!(errors, "[Worker 1]\nFATAL: cannot create output\n");
        assert_eq!(conflicts, "[Worker 1]\nNo Conflicts!\n");
    }

    #[test]
    fn test_render_empty_results() {
        assert!(render_report(ReportKind::Errors, &[]).is_empty());
    }

    #[test]
    fn test_write_reports_creates_dir_and_leaves_no_temp_files() {
        let temp = TempDir::new().unwrap();
        let log_dir = Utf8PathBuf::try_from(temp.path().join("logs")).unwrap();
        let results = vec![with_conflict(1, "/addons/a/x.lua")];

        let paths = write_reports(&log_dir, &results).unwrap();

        assert_eq!(
            fs::read_to_string(&paths.conflicts).unwrap(),
            "[Worker 1]\n/addons/a/x.lua\n"
        );
        assert_eq!(
            fs::read_to_string(&paths.errors).unwrap(),
            "[Worker 1]\nNo Errors!\n"
        );
        let entries = fs::read_dir(&log_dir).unwrap().count();
        assert_eq!(entries, 2);
    }

    #[test]
    fn test_write_reports_replaces_previous_run() {
        let temp = TempDir::new().unwrap();
        let log_dir = Utf8PathBuf::try_from(temp.path().to_path_buf()).unwrap();

        write_reports(&log_dir, &[with_conflict(1, "/first")]).unwrap();
        let paths = write_reports(&log_dir, &[WorkerResult::new(1)]).unwrap();

        assert_eq!(
            fs::read_to_string(&paths.conflicts).unwrap(),
            "[Worker 1]\nNo Conflicts!\n"
        );
    }
}
