use crate::metadata::CanonicalName;
use std::path::{Path, PathBuf};

/// Picks the first free `<canonical>[_<n>].<extension>` path in `target_dir`.
///
/// A base name is taken when the primary name or any `sidecar_extensions`
/// name under it already exists. The check is not atomic; it relies on the
/// run being the only writer to `target_dir`.
pub fn resolve_target(
    target_dir: &Path,
    canonical: &CanonicalName,
    extension: &str,
    sidecar_extensions: &[&str],
) -> PathBuf {
    let base = canonical.as_str();
    if is_available(target_dir, base, sidecar_extensions, extension) {
        return target_dir.join(file_name(base, extension));
    }

    let mut n = 1u64;
    loop {
        let candidate = format!("{}_{}", base, n);
        if is_available(target_dir, &candidate, sidecar_extensions, extension) {
            return target_dir.join(file_name(&candidate, extension));
        }
        n += 1;
    }
}

fn is_available(target_dir: &Path, base: &str, sidecar_extensions: &[&str], extension: &str) -> bool {
    std::iter::once(extension)
        .chain(sidecar_extensions.iter().copied())
        .all(|ext| !target_dir.join(file_name(base, ext)).exists())
}

fn file_name(base: &str, extension: &str) -> String {
    let extension = extension.trim_start_matches('.');
    if extension.is_empty() {
        base.to_string()
    } else {
        format!("{}.{}", base, extension)
    }
}
