use crate::config::{normalize_extension, SidecarExtensions, SidecarRole};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sidecar {
    pub role: SidecarRole,
    pub path: PathBuf,
}

impl Sidecar {
    /// The sidecar's own extension, as spelled on disk.
    pub fn extension(&self) -> String {
        self.path
            .extension()
            .map(|v| v.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Sibling files grouped by directory and exact stem.
///
/// Each directory is listed once, the first time a primary inside it asks
/// for its sidecars.
#[derive(Debug, Default)]
pub struct SidecarIndex {
    files_by_dir: HashMap<PathBuf, HashMap<String, Vec<PathBuf>>>,
}

impl SidecarIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Companion files next to `primary` sharing its stem, one per configured role.
    ///
    /// The stem must match exactly; only the extension is compared without case.
    pub fn find(&mut self, primary: &Path, extensions: &SidecarExtensions) -> Vec<Sidecar> {
        let Some(dir) = primary.parent() else {
            return Vec::new();
        };
        let Some(stem) = primary.file_stem().map(|v| v.to_string_lossy().to_string()) else {
            return Vec::new();
        };
        let Some(candidates) = self.listing(dir).get(&stem) else {
            return Vec::new();
        };

        extensions
            .iter()
            .filter_map(|(role, ext)| {
                pick_candidate_with_case_variants(candidates, normalize_extension(ext))
                    .filter(|path| path != primary)
                    .map(|path| Sidecar { role, path })
            })
            .collect()
    }

    fn listing(&mut self, dir: &Path) -> &HashMap<String, Vec<PathBuf>> {
        self.files_by_dir
            .entry(dir.to_path_buf())
            .or_insert_with(|| index_directory(dir))
    }
}

/// One-off lookup for a single primary.
pub fn find_sidecars(primary: &Path, extensions: &SidecarExtensions) -> Vec<Sidecar> {
    SidecarIndex::new().find(primary, extensions)
}

fn index_directory(dir: &Path) -> HashMap<String, Vec<PathBuf>> {
    let mut by_stem = HashMap::<String, Vec<PathBuf>>::new();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            debug!("could not list {} for sidecars: {err}", dir.display());
            return by_stem;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(stem) = path.file_stem().map(|v| v.to_string_lossy().to_string()) else {
            continue;
        };
        by_stem.entry(stem).or_default().push(path);
    }

    for candidates in by_stem.values_mut() {
        candidates.sort();
    }
    by_stem
}

fn pick_candidate_with_case_variants(candidates: &[PathBuf], ext: &str) -> Option<PathBuf> {
    let extension_of = |path: &PathBuf| {
        path.extension()
            .map(|v| v.to_string_lossy().to_string())
            .unwrap_or_default()
    };

    let lower = ext.to_ascii_lowercase();
    let upper = ext.to_ascii_uppercase();
    candidates
        .iter()
        .find(|path| extension_of(path) == lower)
        .or_else(|| candidates.iter().find(|path| extension_of(path) == upper))
        .or_else(|| {
            candidates
                .iter()
                .find(|path| extension_of(path).eq_ignore_ascii_case(ext))
        })
        .cloned()
}
