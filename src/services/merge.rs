use crate::events::{EventBus, MergeEvent};
use crate::models::{
    ConflictRecord, ErrorRecord, MergeOptions, OutputLayout, WorkAssignment, WorkerResult,
    WorkerStatus,
};
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tempfile::NamedTempFile;
use thiserror::Error;

/// Errors that stop an operation as a whole.
///
/// Per-file problems never surface here; they become [`ConflictRecord`]s and
/// [`ErrorRecord`]s inside the worker's result instead.
#[derive(Error, Debug)]
pub enum MergeError {
    #[error("Failed to create output directory {path}: {source}")]
    OutputRoot { path: Utf8PathBuf, source: io::Error },

    #[error("Failed to read addons directory {path}: {source}")]
    AddonsRoot { path: Utf8PathBuf, source: io::Error },

    #[error("Worker {0} panicked")]
    WorkerPanicked(usize),

    #[error("Failed to write report {path}: {source}")]
    Report { path: Utf8PathBuf, source: io::Error },
}

/// Collects one worker's records and mirrors them to the progress channel.
///
/// Owned by the worker for its whole run; nothing else can reach it.
struct MergeSink<'a> {
    result: WorkerResult,
    events: Option<&'a EventBus>,
}

impl<'a> MergeSink<'a> {
    fn new(worker_id: usize, events: Option<&'a EventBus>) -> Self {
        Self {
            result: WorkerResult::new(worker_id),
            events,
        }
    }

    fn worker_id(&self) -> usize {
        self.result.worker_id
    }

    fn emit(&self, event: MergeEvent) {
        if let Some(events) = self.events {
            events.emit(event);
        }
    }

    fn copied(&mut self, bytes: u64) {
        self.result.stats.record_file_copied(bytes);
    }

    fn conflict(&mut self, source: &Utf8Path, destination: &Utf8Path) {
        tracing::warn!(
            "[Worker {}] Conflict: {} already exists, kept existing file",
            self.worker_id(),
            destination
        );
        self.emit(MergeEvent::Conflict {
            worker: self.worker_id(),
            source: source.to_path_buf(),
        });
        self.result.stats.record_conflict();
        self.result.conflicts.push(ConflictRecord {
            source: source.to_path_buf(),
            destination: destination.to_path_buf(),
        });
    }

    fn error(&mut self, path: &Utf8Path, message: String) {
        tracing::warn!("[Worker {}] {}: {}", self.worker_id(), path, message);
        self.emit(MergeEvent::CopyFailed {
            worker: self.worker_id(),
            path: path.to_path_buf(),
            message: message.clone(),
        });
        self.result.stats.record_error();
        self.result.errors.push(ErrorRecord::new(path, message));
    }
}

/// One unit of concurrent work: merges its assigned addons into the output root.
///
/// The worker owns its assignment and a shared handle to the read-only
/// options. Calling [`run`](Self::run) consumes it and hands back the result,
/// so nothing is left for another thread to observe mid-run.
#[derive(Debug)]
pub struct MergeWorker {
    assignment: WorkAssignment,
    options: Arc<MergeOptions>,
    events: Option<EventBus>,
}

impl MergeWorker {
    pub fn new(assignment: WorkAssignment, options: Arc<MergeOptions>) -> Self {
        Self {
            assignment,
            options,
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn worker_id(&self) -> usize {
        self.assignment.worker_id
    }

    /// Merge every assigned addon, blocking the calling thread until done.
    ///
    /// Individual file failures are recorded and skipped. The only fatal
    /// condition is an output root that cannot be created, which ends the
    /// worker with [`WorkerStatus::Failed`] before any addon is touched.
    pub fn run(self) -> WorkerResult {
        let start = Instant::now();
        let id = self.worker_id();
        let mut sink = MergeSink::new(id, self.events.as_ref());

        tracing::info!(
            "[Worker {}] Started processing {} addon(s)...",
            id,
            self.assignment.len()
        );
        sink.emit(MergeEvent::WorkerStarted {
            worker: id,
            addons: self.assignment.len(),
        });

        if let Err(source) = fs::create_dir_all(&self.options.output_root) {
            let err = MergeError::OutputRoot {
                path: self.options.output_root.clone(),
                source,
            };
            tracing::error!("[Worker {}] {}", id, err);
            sink.result.status = WorkerStatus::Failed {
                reason: err.to_string(),
            };
        } else {
            // Never walk back into the output tree from inside an addon
            let output_guard = fs::canonicalize(&self.options.output_root).ok();

            for addon in &self.assignment.addons {
                tracing::info!("[Worker {}] Started processing addon: {}", id, addon);
                sink.emit(MergeEvent::AddonStarted {
                    worker: id,
                    addon: addon.clone(),
                });

                merge_addon(addon, &self.options, output_guard.as_ref(), &mut sink);
                sink.result.stats.record_addon_merged();

                tracing::info!("[Worker {}] Finished processing addon: {}", id, addon);
                sink.emit(MergeEvent::AddonFinished {
                    worker: id,
                    addon: addon.clone(),
                });
            }

            tracing::info!(
                "[Worker {}] Finished merging {} addons into {}",
                id,
                self.assignment.len(),
                self.options.output_root
            );
        }

        sink.result.stats.elapsed = start.elapsed();
        sink.emit(MergeEvent::WorkerFinished {
            worker: id,
            status: sink.result.status.clone(),
        });
        sink.result
    }
}

/// Where an addon's tree lands under the output root.
pub fn addon_destination(addon_root: &Utf8Path, options: &MergeOptions) -> Option<Utf8PathBuf> {
    match options.layout {
        OutputLayout::Nested => addon_root
            .file_name()
            .map(|name| options.output_root.join(name)),
        OutputLayout::Flatten => Some(options.output_root.clone()),
    }
}

fn merge_addon(
    addon_root: &Utf8Path,
    options: &MergeOptions,
    output_guard: Option<&PathBuf>,
    sink: &mut MergeSink<'_>,
) {
    let Some(destination) = addon_destination(addon_root, options) else {
        sink.error(addon_root, "Addon path has no directory name".to_string());
        return;
    };

    let mut visited = HashSet::new();
    if let Some(guard) = output_guard {
        visited.insert(guard.clone());
    }
    if !enter_directory(addon_root, &mut visited, sink) {
        return;
    }

    if let Err(e) = fs::create_dir_all(&destination) {
        sink.error(&destination, format!("Failed to create directory: {}", e));
        return;
    }

    merge_directory(addon_root, &destination, options, &mut visited, sink);
}

/// Marks `source` as walked for this addon.
///
/// Returns false, after recording an error, if its canonical path was
/// already visited or cannot be resolved. Checked before the matching output
/// directory is created, so a skipped directory leaves nothing behind.
fn enter_directory(
    source: &Utf8Path,
    visited: &mut HashSet<PathBuf>,
    sink: &mut MergeSink<'_>,
) -> bool {
    let canonical = match fs::canonicalize(source) {
        Ok(path) => path,
        Err(e) => {
            sink.error(source, format!("Failed to resolve directory: {}", e));
            return false;
        }
    };
    if !visited.insert(canonical) {
        sink.error(
            source,
            "Directory already visited (symlink loop or output directory), skipped".to_string(),
        );
        return false;
    }
    true
}

/// Copies the files of `source` into `destination`, then recurses into each
/// subdirectory (pre-order, files before directories).
///
/// `source` must already have passed [`enter_directory`]. `visited` holds
/// canonical paths of every directory already walked for this addon; a
/// directory reached a second time, through a symlink cycle or a second link
/// to the same target, is recorded as an error and not entered.
///
/// Only regular files are copied. FIFOs, sockets and device nodes would block
/// or never end when read, so they are recorded as errors and skipped.
fn merge_directory(
    source: &Utf8Path,
    destination: &Utf8Path,
    options: &MergeOptions,
    visited: &mut HashSet<PathBuf>,
    sink: &mut MergeSink<'_>,
) {
    let entries = match fs::read_dir(source) {
        Ok(entries) => entries,
        Err(e) => {
            sink.error(source, format!("Failed to read directory: {}", e));
            return;
        }
    };
    sink.result.stats.record_directory_visited();

    let mut files = Vec::new();
    let mut directories = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                sink.error(source, format!("Failed to read directory entry: {}", e));
                continue;
            }
        };
        let path = match Utf8PathBuf::from_path_buf(entry.path()) {
            Ok(path) => path,
            Err(path) => {
                sink.error(
                    source,
                    format!("Skipping entry with non UTF-8 name: {}", path.display()),
                );
                continue;
            }
        };
        // Symlinks are classified by their target
        match fs::metadata(&path) {
            Ok(metadata) if metadata.is_dir() => directories.push(path),
            Ok(metadata) if metadata.is_file() => files.push(path),
            Ok(_) => sink.error(&path, "Not a regular file, skipped".to_string()),
            Err(e) => sink.error(&path, format!("Failed to read metadata: {}", e)),
        }
    }

    for file in &files {
        let Some(name) = file.file_name() else {
            continue;
        };
        copy_file(file, &destination.join(name), options.overwrite_conflicts, sink);
    }

    for directory in &directories {
        let Some(name) = directory.file_name() else {
            continue;
        };
        if !enter_directory(directory, visited, sink) {
            continue;
        }
        let target = destination.join(name);
        // create_dir_all tolerates the directory already existing, including
        // when another worker creates it concurrently
        if let Err(e) = fs::create_dir_all(&target) {
            sink.error(&target, format!("Failed to create directory: {}", e));
            continue;
        }
        merge_directory(directory, &target, options, visited, sink);
    }
}

fn copy_file(
    source: &Utf8Path,
    destination: &Utf8Path,
    overwrite: bool,
    sink: &mut MergeSink<'_>,
) {
    let copied = if overwrite {
        copy_replace(source, destination)
    } else {
        copy_new(source, destination)
    };

    match copied {
        Ok(bytes) => sink.copied(bytes),
        Err(e) if !overwrite && e.kind() == io::ErrorKind::AlreadyExists => {
            sink.conflict(source, destination)
        }
        Err(e) => sink.error(source, format!("Failed to copy to {}: {}", destination, e)),
    }
}

/// Copies `source` to `destination` only if the destination does not exist yet.
///
/// Existence is decided by an exclusive create, so two workers racing for the
/// same destination cannot both win. A partially written file is removed.
fn copy_new(source: &Utf8Path, destination: &Utf8Path) -> io::Result<u64> {
    let mut reader = File::open(source)?;
    let permissions = reader.metadata()?.permissions();
    let mut writer = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(destination)?;

    let copied = io::copy(&mut reader, &mut writer).and_then(|bytes| {
        writer.set_permissions(permissions)?;
        Ok(bytes)
    });

    if copied.is_err() {
        drop(writer);
        let _ = fs::remove_file(destination);
    }
    copied
}

/// Copies `source` over `destination`, replacing any existing file.
///
/// The bytes go to a temporary file in the destination directory which is
/// then renamed into place. Concurrent writers to one destination each
/// rename a complete file and the last rename wins.
fn copy_replace(source: &Utf8Path, destination: &Utf8Path) -> io::Result<u64> {
    let mut reader = File::open(source)?;
    let permissions = reader.metadata()?.permissions();
    let dir = destination.parent().unwrap_or(Utf8Path::new("."));

    // Removed on drop unless persisted
    let mut staged = NamedTempFile::new_in(dir)?;
    let bytes = io::copy(&mut reader, staged.as_file_mut())?;
    staged.as_file().set_permissions(permissions)?;
    staged.persist(destination).map_err(|e| e.error)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn utf8_temp() -> (TempDir, Utf8PathBuf) {
        let temp = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp.path().to_path_buf()).unwrap();
        (temp, root)
    }

    fn run_single(addons: Vec<Utf8PathBuf>, options: MergeOptions) -> WorkerResult {
        let assignment = WorkAssignment {
            worker_id: 1,
            addons,
        };
        MergeWorker::new(assignment, Arc::new(options)).run()
    }

    #[test]
    fn test_addon_destination_per_layout() {
        let nested = MergeOptions::new("/out");
        let flat = MergeOptions::new("/out").with_layout(OutputLayout::Flatten);
        let addon = Utf8Path::new("/addons/wire");

        assert_eq!(
            addon_destination(addon, &nested),
            Some(Utf8PathBuf::from("/out/wire"))
        );
        assert_eq!(
            addon_destination(addon, &flat),
            Some(Utf8PathBuf::from("/out"))
        );
    }

    #[test]
    fn test_copy_new_refuses_existing_destination() {
        let (_temp, root) = utf8_temp();
        let source = root.join("src.txt");
        let destination = root.join("dst.txt");
        fs::write(&source, b"new").unwrap();
        fs::write(&destination, b"old").unwrap();

        let err = copy_new(&source, &destination).unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs::read(&destination).unwrap(), b"old");
    }

    #[test]
    fn test_copy_new_copies_bytes() {
        let (_temp, root) = utf8_temp();
        let source = root.join("src.bin");
        let destination = root.join("dst.bin");
        fs::write(&source, [0u8, 1, 2, 255]).unwrap();

        let bytes = copy_new(&source, &destination).unwrap();

        assert_eq!(bytes, 4);
        assert_eq!(fs::read(&destination).unwrap(), vec![0u8, 1, 2, 255]);
    }

    #[test]
    fn test_missing_source_is_an_error_not_a_conflict() {
        let (_temp, root) = utf8_temp();
        let addon = root.join("addon");
        fs::create_dir(&addon).unwrap();
        let mut sink = MergeSink::new(1, None);

        copy_file(&addon.join("gone.txt"), &root.join("gone.txt"), false, &mut sink);

        assert!(sink.result.conflicts.is_empty());
        assert_eq!(sink.result.errors.len(), 1);
        assert_eq!(sink.result.stats.errors, 1);
    }

    #[test]
    fn test_worker_counts_directories_and_bytes() {
        let (_temp, root) = utf8_temp();
        let addon = root.join("addons").join("wire");
        fs::create_dir_all(addon.join("lua").join("entities")).unwrap();
        fs::write(addon.join("addon.json"), b"{}").unwrap();
        fs::write(addon.join("lua").join("entities").join("gate.lua"), b"print(1)").unwrap();

        let result = run_single(vec![addon], MergeOptions::new(root.join("out")));

        assert_eq!(result.status, WorkerStatus::Completed);
        assert_eq!(result.stats.addons_merged, 1);
        assert_eq!(result.stats.files_copied, 2);
        assert_eq!(result.stats.bytes_copied, 10);
        assert_eq!(result.stats.directories_visited, 3);
        assert!(root.join("out/wire/lua/entities/gate.lua").is_file());
    }

    #[test]
    fn test_unreachable_output_root_is_fatal() {
        let (_temp, root) = utf8_temp();
        let blocker = root.join("not_a_dir");
        fs::write(&blocker, b"file in the way").unwrap();
        let addon = root.join("addon");
        fs::create_dir(&addon).unwrap();
        fs::write(addon.join("a.txt"), b"a").unwrap();

        let result = run_single(vec![addon], MergeOptions::new(blocker.join("out")));

        assert!(result.status.is_failed());
        assert!(result.errors.is_empty());
        assert_eq!(result.stats.addons_merged, 0);
    }

    #[test]
    fn test_output_inside_addon_is_not_copied_into_itself() {
        let (_temp, root) = utf8_temp();
        let addon = root.join("addon");
        fs::create_dir(&addon).unwrap();
        fs::write(addon.join("a.txt"), b"a").unwrap();
        let output = addon.join("merged");

        let result = run_single(vec![addon], MergeOptions::new(output.clone()));

        assert_eq!(result.status, WorkerStatus::Completed);
        assert!(output.join("addon").join("a.txt").is_file());
        assert!(!output.join("addon").join("merged").exists());
        assert_eq!(result.errors.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_cycle_terminates() {
        let (_temp, root) = utf8_temp();
        let addon = root.join("addon");
        fs::create_dir_all(addon.join("sub")).unwrap();
        fs::write(addon.join("sub").join("b.txt"), b"b").unwrap();
        std::os::unix::fs::symlink(&addon, addon.join("sub").join("loop")).unwrap();

        let result = run_single(vec![addon], MergeOptions::new(root.join("out")));

        assert_eq!(result.status, WorkerStatus::Completed);
        assert!(root.join("out/addon/sub/b.txt").is_file());
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].message.contains("already visited"));
        assert!(!root.join("out/addon/sub/loop").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_fifo_is_skipped_not_opened() {
        let (_temp, root) = utf8_temp();
        let addon = root.join("addon");
        fs::create_dir(&addon).unwrap();
        fs::write(addon.join("x.txt"), b"x").unwrap();
        let status = std::process::Command::new("mkfifo")
            .arg(addon.join("pipe").as_str())
            .status()
            .unwrap();
        assert!(status.success());

        let result = run_single(vec![addon.clone()], MergeOptions::new(root.join("out")));

        assert_eq!(result.status, WorkerStatus::Completed);
        assert_eq!(result.stats.files_copied, 1);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].path, addon.join("pipe"));
        assert!(result.errors[0].message.contains("Not a regular file"));
        assert!(!root.join("out/addon/pipe").exists());
    }

    #[test]
    fn test_copy_replace_overwrites_whole_file() {
        let (_temp, root) = utf8_temp();
        let source = root.join("src.txt");
        let destination = root.join("dst.txt");
        fs::write(&source, b"new").unwrap();
        fs::write(&destination, b"a much longer old file").unwrap();

        let bytes = copy_replace(&source, &destination).unwrap();

        assert_eq!(bytes, 3);
        assert_eq!(fs::read(&destination).unwrap(), b"new");
        // Only the two files remain, no staging leftovers
        assert_eq!(fs::read_dir(&root).unwrap().count(), 2);
    }
}
