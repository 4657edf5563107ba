use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use phylum_ci_core::{Ecosystem, PhylumCiError};
use tracing::{debug, trace};

use crate::catalog::Depfile;
use crate::filter::DepfileFilter;

/// Walk a work tree, respecting `.gitignore`, returning its dependency files.
///
/// Excluded and vendored paths are skipped. A manifest is dropped when a
/// lockfile of the same ecosystem sits in its own directory. Nested manifests
/// under a lockfile higher up are kept. Returned paths are relative to `root`
/// and sorted.
///
/// # Errors
///
/// Returns [`PhylumCiError::Io`] if `root` cannot be read.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use phylum_ci_depfiles::{discover_depfiles, DepfileFilter};
///
/// let depfiles = discover_depfiles(Path::new("."), &DepfileFilter::vendored_only()).unwrap();
/// for depfile in &depfiles {
///     println!("{depfile}");
/// }
/// ```
pub fn discover_depfiles(root: &Path, filter: &DepfileFilter) -> Result<Vec<Depfile>, PhylumCiError> {
    std::fs::read_dir(root)?;

    let walker = ignore::WalkBuilder::new(root)
        .require_git(false)
        .filter_entry(|entry| {
            // Prune whole vendored trees instead of filtering their files.
            let name = entry.file_name().to_string_lossy();
            !matches!(name.as_ref(), "node_modules" | "vendor" | "third_party" | "target")
        })
        .build();

    let mut found = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                trace!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }

        let relative = match entry.path().strip_prefix(root) {
            Ok(r) => r.to_path_buf(),
            Err(_) => entry.path().to_path_buf(),
        };
        let Some(depfile) = Depfile::classify(&relative) else {
            continue;
        };
        if let Some(reason) = filter.excluded_by(&relative) {
            debug!(path = %relative.display(), reason, "excluded dependency file");
            continue;
        }
        found.push(depfile);
    }

    let lockfile_dirs: BTreeSet<(Ecosystem, PathBuf)> = found
        .iter()
        .filter(|d| !d.is_manifest())
        .map(|d| (d.ecosystem, parent_dir(&d.path)))
        .collect();

    let mut depfiles: Vec<Depfile> = found
        .into_iter()
        .filter(|d| {
            if !d.is_manifest() {
                return true;
            }
            let covered = lockfile_dirs.contains(&(d.ecosystem, parent_dir(&d.path)));
            if covered {
                debug!(path = %d.path.display(), "manifest covered by a lockfile");
            }
            !covered
        })
        .collect();
    depfiles.sort_by(|a, b| a.path.cmp(&b.path));
    debug!(count = depfiles.len(), "discovered dependency files");
    Ok(depfiles)
}

/// Dependency files whose path appears in `changed`.
///
/// A manifest also counts as changed when one of its lockfile names changed
/// in the same directory, so regenerating it picks up the edit.
pub fn changed_depfiles(depfiles: &[Depfile], changed: &BTreeSet<PathBuf>) -> Vec<Depfile> {
    depfiles
        .iter()
        .filter(|d| {
            changed.contains(&d.path)
                || d.lockfile_names()
                    .iter()
                    .any(|name| changed.contains(&parent_dir(&d.path).join(name)))
        })
        .cloned()
        .collect()
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}
