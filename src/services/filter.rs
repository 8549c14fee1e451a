//! Addon discovery and the ignore filter.
//!
//! Addons are the immediate subdirectories of the addons root. Before merging,
//! every candidate whose directory name appears in the [`IgnoreList`] is dropped.
//!
//! ```ignore
//! use addon_merger::services::{discover_addons, filter_addons};
//!
//! let candidates = discover_addons("/srv/garrysmod/addons".into())?;
//! let addons = filter_addons(&ignore_list, &candidates);
//! ```

use super::merge::MergeError;
use crate::models::IgnoreList;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// Lists the directories directly under `addons_root`, sorted by name.
///
/// Plain files in the root are not addons and are skipped. So are folders
/// whose name is not valid UTF-8; each one is logged and the rest still merge.
///
/// # Errors
///
/// [`MergeError::AddonsRoot`] if the root cannot be read.
pub fn discover_addons(addons_root: &Utf8Path) -> Result<Vec<Utf8PathBuf>, MergeError> {
    let read_root = |source| MergeError::AddonsRoot {
        path: addons_root.to_path_buf(),
        source,
    };

    let mut addons = Vec::new();
    for entry in fs::read_dir(addons_root).map_err(read_root)? {
        let entry = entry.map_err(read_root)?;
        // Follow symlinks: a linked addon directory is still an addon
        let is_dir = fs::metadata(entry.path())
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            continue;
        }
        match Utf8PathBuf::from_path_buf(entry.path()) {
            Ok(path) => addons.push(path),
            Err(path) => {
                tracing::warn!("Skipping non UTF-8 addon folder {}", path.display());
            }
        }
    }

    addons.sort();
    tracing::info!("Found {} folders within {}", addons.len(), addons_root);
    Ok(addons)
}

/// Keeps every candidate whose final path segment is not in `ignore`.
///
/// Input order is preserved. Each skipped candidate is logged.
pub fn filter_addons(ignore: &IgnoreList, candidates: &[Utf8PathBuf]) -> Vec<Utf8PathBuf> {
    candidates
        .iter()
        .filter(|candidate| {
            let ignored = candidate
                .file_name()
                .is_some_and(|name| ignore.contains(name));
            if ignored {
                tracing::info!("Ignoring {}...", candidate);
            }
            !ignored
        })
        .cloned()
        .collect()
}
