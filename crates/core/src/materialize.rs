use crate::error::RenameError;
use crate::matcher::Sidecar;
use filetime::FileTime;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Materialized {
    pub primary: PathBuf,
    pub sidecars: Vec<PathBuf>,
}

/// Copies `source` to `target`, then each sidecar to `target`'s stem with the
/// sidecar's own extension.
///
/// A failed primary copy leaves nothing behind and is returned as an error.
/// Sidecar failures are logged and never undo the primary copy.
pub fn materialize(
    source: &Path,
    target: &Path,
    sidecars: &[Sidecar],
) -> Result<Materialized, RenameError> {
    copy_preserving_metadata(source, target)?;
    debug!("copied {} -> {}", source.display(), target.display());

    let mut copied = Vec::with_capacity(sidecars.len());
    for sidecar in sidecars {
        let destination = sidecar_target(target, &sidecar.extension());
        match copy_preserving_metadata(&sidecar.path, &destination) {
            Ok(()) => {
                debug!(
                    "copied {:?} sidecar {} -> {}",
                    sidecar.role,
                    sidecar.path.display(),
                    destination.display()
                );
                copied.push(destination);
            }
            Err(err) => {
                warn!("sidecar not copied for {}: {err}", source.display());
            }
        }
    }

    Ok(Materialized {
        primary: target.to_path_buf(),
        sidecars: copied,
    })
}

pub fn sidecar_target(primary_target: &Path, extension: &str) -> PathBuf {
    let parent = primary_target.parent().unwrap_or_else(|| Path::new("."));
    let stem = primary_target
        .file_stem()
        .map(|v| v.to_string_lossy().to_string())
        .unwrap_or_default();
    parent.join(format!("{}.{}", stem, extension))
}

/// Copies bytes and permissions, then carries over access and modification
/// times. Never overwrites an existing file.
pub fn copy_preserving_metadata(from: &Path, to: &Path) -> Result<(), RenameError> {
    if to.exists() {
        return Err(RenameError::TargetExists(to.to_path_buf()));
    }

    let copy_failure = |source| RenameError::CopyFailure {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    let source_meta = fs::metadata(from).map_err(copy_failure)?;
    if let Err(err) = fs::copy(from, to) {
        if to.exists() {
            if let Err(cleanup_err) = fs::remove_file(to) {
                warn!(
                    "could not remove partial copy {}: {cleanup_err}",
                    to.display()
                );
            }
        }
        return Err(copy_failure(err));
    }

    let atime = FileTime::from_last_access_time(&source_meta);
    let mtime = FileTime::from_last_modification_time(&source_meta);
    if let Err(err) = filetime::set_file_times(to, atime, mtime) {
        warn!("could not preserve file times on {}: {err}", to.display());
    }

    Ok(())
}
