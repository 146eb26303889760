use crate::config::normalize_extension;
use crate::error::RenameError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Lazily walks `root` for files carrying `extension` (case-insensitive).
///
/// Yielded paths are absolute. Hidden files are skipped and `exclude`, when it
/// lies under `root`, is not descended into.
pub fn scan_sources(
    root: &Path,
    extension: &str,
    exclude: Option<&Path>,
) -> Result<impl Iterator<Item = PathBuf>, RenameError> {
    if !root.exists() {
        return Err(RenameError::SourceDirectoryNotFound(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(RenameError::SourceNotDirectory(root.to_path_buf()));
    }

    let root = fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
    let exclude = exclude.and_then(|dir| fs::canonicalize(dir).ok());
    let extension = normalize_extension(extension).to_string();

    let walker = WalkDir::new(&root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |entry| match exclude.as_deref() {
            Some(excluded) => entry.depth() == 0 || entry.path() != excluded,
            None => true,
        });

    Ok(walker.filter_map(move |entry| {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("skipping unreadable entry: {err}");
                return None;
            }
        };
        if !entry.file_type().is_file() {
            return None;
        }

        let path = entry.path();
        if !has_extension(path, &extension) {
            return None;
        }
        if is_hidden(path) {
            debug!("skipping hidden file: {}", path.display());
            return None;
        }
        Some(entry.into_path())
    }))
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}
