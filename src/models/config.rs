use camino::Utf8PathBuf;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Name of the output directory placed under the addons root when no output is given.
pub const DEFAULT_MERGE_DIR: &str = "_MERGED";

/// Default number of addons handed to each worker.
pub const DEFAULT_ADDONS_PER_WORKER: usize = 20;

/// Default directory for consolidated conflict/error reports.
pub const DEFAULT_LOG_DIR: &str = "logs";

/// Half the available hardware concurrency, rounded up.
pub fn default_max_workers() -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    cores.div_ceil(2)
}

fn default_addons_per_worker() -> usize {
    DEFAULT_ADDONS_PER_WORKER
}

fn default_log_dir() -> String {
    DEFAULT_LOG_DIR.to_string()
}

/// Directory names excluded from merging, loaded from `ignore.yaml`.
///
/// Serialized as a plain YAML sequence. Order is kept so re-saving the file
/// does not shuffle the user's entries; duplicates collapse on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IgnoreList {
    names: IndexSet<String>,
}

impl IgnoreList {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Exact, case-sensitive match against a directory name.
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl Default for IgnoreList {
    /// Version-control metadata and the default merge output directory.
    fn default() -> Self {
        Self::new([".git", DEFAULT_MERGE_DIR])
    }
}

/// How an addon's tree is placed under the output root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputLayout {
    /// `<output>/<addon name>/...`
    #[default]
    Nested,
    /// `<output>/...`: every addon is overlaid onto the same tree.
    Flatten,
}

/// Persisted defaults from `settings.yaml`. CLI flags override these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeSettings {
    #[serde(rename = "Max Workers", default = "default_max_workers")]
    pub max_workers: usize,

    #[serde(rename = "Addons Per Worker", default = "default_addons_per_worker")]
    pub addons_per_worker: usize,

    #[serde(rename = "Overwrite Conflicts", default)]
    pub overwrite_conflicts: bool,

    #[serde(rename = "Log", default)]
    pub log: bool,

    #[serde(rename = "Log Directory", default = "default_log_dir")]
    pub log_dir: String,

    #[serde(rename = "Layout", default)]
    pub layout: OutputLayout,
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            addons_per_worker: DEFAULT_ADDONS_PER_WORKER,
            overwrite_conflicts: false,
            log: false,
            log_dir: default_log_dir(),
            layout: OutputLayout::default(),
        }
    }
}

/// Immutable options shared read-only by every worker of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOptions {
    pub output_root: Utf8PathBuf,
    pub overwrite_conflicts: bool,
    pub logging: bool,
    pub layout: OutputLayout,
}

impl MergeOptions {
    pub fn new(output_root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            overwrite_conflicts: false,
            logging: false,
            layout: OutputLayout::Nested,
        }
    }

    pub fn with_overwrite_conflicts(mut self, overwrite: bool) -> Self {
        self.overwrite_conflicts = overwrite;
        self
    }

    pub fn with_logging(mut self, logging: bool) -> Self {
        self.logging = logging;
        self
    }

    pub fn with_layout(mut self, layout: OutputLayout) -> Self {
        self.layout = layout;
        self
    }
}
