//! Changed-file extraction from git diffs.

use std::path::{Path, PathBuf};

use git2::{Delta, Diff};
use phylum_ci_core::PhylumCiError;

/// A single file change between two trees.
///
/// # Examples
///
/// ```
/// use phylum_ci_git::{ChangedFile, ChangeStatus};
/// use std::path::PathBuf;
///
/// let change = ChangedFile {
///     path: PathBuf::from("package-lock.json"),
///     status: ChangeStatus::Modified,
/// };
/// assert!(change.status.is_present());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ChangedFile {
    /// Path relative to the repository root (new path for renames).
    pub path: PathBuf,
    /// Type of change.
    pub status: ChangeStatus,
}

/// Status of a file change.
///
/// # Examples
///
/// ```
/// use phylum_ci_git::ChangeStatus;
///
/// assert!(ChangeStatus::Added.is_present());
/// assert!(!ChangeStatus::Deleted.is_present());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChangeStatus {
    /// New file.
    Added,
    /// Existing file modified.
    Modified,
    /// File removed.
    Deleted,
    /// File renamed from another path.
    Renamed {
        /// Original path before rename.
        from: PathBuf,
    },
}

impl ChangeStatus {
    /// `true` when the file exists on the new side of the diff.
    pub fn is_present(&self) -> bool {
        !matches!(self, ChangeStatus::Deleted)
    }
}

pub(crate) fn collect_changes(mut diff: Diff<'_>) -> Result<Vec<ChangedFile>, PhylumCiError> {
    let mut find_opts = git2::DiffFindOptions::new();
    find_opts.renames(true);
    diff.find_similar(Some(&mut find_opts))
        .map_err(|e| PhylumCiError::Git(format!("failed to find renames: {e}")))?;

    let mut changes = Vec::new();
    for delta in diff.deltas() {
        let new_path = delta.new_file().path().map(Path::to_path_buf);
        let old_path = delta.old_file().path().map(Path::to_path_buf);

        let change = match delta.status() {
            Delta::Added | Delta::Untracked | Delta::Copied => new_path.map(|path| ChangedFile {
                path,
                status: ChangeStatus::Added,
            }),
            Delta::Deleted => old_path.map(|path| ChangedFile {
                path,
                status: ChangeStatus::Deleted,
            }),
            Delta::Renamed => new_path.map(|path| ChangedFile {
                path,
                status: ChangeStatus::Renamed {
                    from: old_path.unwrap_or_default(),
                },
            }),
            Delta::Unmodified | Delta::Ignored => None,
            _ => new_path.map(|path| ChangedFile {
                path,
                status: ChangeStatus::Modified,
            }),
        };

        if let Some(change) = change {
            changes.push(change);
        }
    }

    changes.sort();
    Ok(changes)
}
