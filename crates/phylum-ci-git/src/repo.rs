//! Repository access via git2.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use git2::{Commit, DiffOptions, ErrorCode, Oid, Repository};
use phylum_ci_core::PhylumCiError;
use tracing::debug;

use crate::changes::{collect_changes, ChangedFile};

/// A git repository opened for change detection.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use phylum_ci_git::GitRepo;
///
/// let repo = GitRepo::discover(Path::new(".")).unwrap();
/// let head = repo.head_commit().unwrap();
/// let base = repo.merge_base("origin/main", &head).unwrap();
/// for change in repo.changed_files(&base, &head).unwrap() {
///     println!("{}", change.path.display());
/// }
/// ```
pub struct GitRepo {
    repo: Repository,
    root: PathBuf,
}

impl GitRepo {
    /// Open the repository enclosing `path`.
    ///
    /// # Errors
    ///
    /// Returns [`PhylumCiError::Git`] if `path` is not inside a work tree.
    pub fn discover(path: &Path) -> Result<Self, PhylumCiError> {
        let repo = Repository::discover(path).map_err(|e| {
            PhylumCiError::Git(format!(
                "not a git repository: {} ({})",
                path.display(),
                e.message()
            ))
        })?;
        let root = repo
            .workdir()
            .ok_or_else(|| PhylumCiError::Git("bare repositories are not supported".into()))?
            .to_path_buf();
        Ok(Self { repo, root })
    }

    /// Root of the work tree.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full SHA of `HEAD`.
    ///
    /// # Errors
    ///
    /// Returns [`PhylumCiError::Git`] when `HEAD` is unborn.
    pub fn head_commit(&self) -> Result<String, PhylumCiError> {
        let head = self
            .repo
            .head()
            .and_then(|h| h.peel_to_commit())
            .map_err(|e| PhylumCiError::Git(format!("failed to resolve HEAD: {e}")))?;
        Ok(head.id().to_string())
    }

    /// Short name of the checked-out branch, `None` when detached.
    pub fn current_branch(&self) -> Option<String> {
        let head = self.repo.head().ok()?;
        if !head.is_branch() {
            return None;
        }
        head.shorthand().map(str::to_string)
    }

    /// Resolve a SHA, branch, tag, or remote ref to a commit SHA.
    ///
    /// Bare branch names that only exist on `origin` are also accepted, which
    /// is how CI checkouts usually present the target branch. A `refs/heads/`
    /// prefix, as reported by Azure Pipelines, is stripped before lookup.
    ///
    /// # Errors
    ///
    /// Returns [`PhylumCiError::Git`] if no candidate resolves.
    pub fn resolve(&self, spec: &str) -> Result<String, PhylumCiError> {
        let short = spec.strip_prefix("refs/heads/").unwrap_or(spec);
        let candidates = [
            spec.to_string(),
            short.to_string(),
            format!("origin/{short}"),
            format!("refs/remotes/origin/{short}"),
        ];
        for candidate in &candidates {
            if let Ok(commit) = self
                .repo
                .revparse_single(candidate)
                .and_then(|obj| obj.peel_to_commit())
            {
                debug!(spec, candidate = candidate.as_str(), "resolved ref");
                return Ok(commit.id().to_string());
            }
        }
        Err(PhylumCiError::Git(format!(
            "unable to resolve '{spec}'; make sure the ref is fetched (e.g. a full-depth checkout)"
        )))
    }

    /// Common ancestor of two refs.
    ///
    /// # Errors
    ///
    /// Returns [`PhylumCiError::Git`] if either ref does not resolve or the
    /// histories share no commit (often a shallow clone).
    pub fn merge_base(&self, a: &str, b: &str) -> Result<String, PhylumCiError> {
        let a_oid = self.oid(&self.resolve(a)?)?;
        let b_oid = self.oid(&self.resolve(b)?)?;
        let base = self.repo.merge_base(a_oid, b_oid).map_err(|e| {
            PhylumCiError::Git(format!(
                "no common ancestor between '{a}' and '{b}': {}; \
                 shallow clones must fetch full history",
                e.message()
            ))
        })?;
        Ok(base.to_string())
    }

    /// Name of the default branch.
    ///
    /// Uses `refs/remotes/origin/HEAD` when present, then the first of `main`
    /// or `master` that exists locally or on `origin`.
    pub fn default_branch(&self) -> Option<String> {
        if let Ok(reference) = self.repo.find_reference("refs/remotes/origin/HEAD") {
            if let Some(target) = reference.symbolic_target() {
                if let Some(name) = target.strip_prefix("refs/remotes/origin/") {
                    return Some(name.to_string());
                }
            }
        }
        ["main", "master"]
            .into_iter()
            .find(|name| self.resolve(name).is_ok())
            .map(str::to_string)
    }

    /// Files added, modified, renamed, or deleted between two commits.
    ///
    /// # Errors
    ///
    /// Returns [`PhylumCiError::Git`] if either ref does not resolve.
    pub fn changed_files(&self, base: &str, head: &str) -> Result<Vec<ChangedFile>, PhylumCiError> {
        let base_commit = self.commit(base)?;
        let head_commit = self.commit(head)?;
        let base_tree = base_commit
            .tree()
            .map_err(|e| PhylumCiError::Git(format!("failed to get base tree: {e}")))?;
        let head_tree = head_commit
            .tree()
            .map_err(|e| PhylumCiError::Git(format!("failed to get head tree: {e}")))?;

        let mut diff_opts = DiffOptions::new();
        let diff = self
            .repo
            .diff_tree_to_tree(Some(&base_tree), Some(&head_tree), Some(&mut diff_opts))
            .map_err(|e| PhylumCiError::Git(format!("failed to compute diff: {e}")))?;
        let changes = collect_changes(diff)?;
        debug!(base, head, count = changes.len(), "computed changed files");
        Ok(changes)
    }

    /// Files staged in the index relative to `HEAD`.
    ///
    /// Before the first commit every staged file counts as added.
    pub fn staged_files(&self) -> Result<Vec<ChangedFile>, PhylumCiError> {
        let head_tree = match self.repo.head() {
            Ok(head) => Some(
                head.peel_to_tree()
                    .map_err(|e| PhylumCiError::Git(format!("failed to get HEAD tree: {e}")))?,
            ),
            Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
                None
            }
            Err(e) => return Err(PhylumCiError::Git(format!("failed to resolve HEAD: {e}"))),
        };
        let index = self
            .repo
            .index()
            .map_err(|e| PhylumCiError::Git(format!("failed to read index: {e}")))?;

        let mut diff_opts = DiffOptions::new();
        let diff = self
            .repo
            .diff_tree_to_index(head_tree.as_ref(), Some(&index), Some(&mut diff_opts))
            .map_err(|e| PhylumCiError::Git(format!("failed to diff index: {e}")))?;
        collect_changes(diff)
    }

    /// Paths touched between two commits; renames contribute their new path.
    pub fn changed_paths(&self, base: &str, head: &str) -> Result<BTreeSet<PathBuf>, PhylumCiError> {
        Ok(self
            .changed_files(base, head)?
            .into_iter()
            .map(|c| c.path)
            .collect())
    }

    /// Paths staged in the index relative to `HEAD`.
    pub fn staged_paths(&self) -> Result<BTreeSet<PathBuf>, PhylumCiError> {
        Ok(self.staged_files()?.into_iter().map(|c| c.path).collect())
    }

    /// Contents of `path` (relative to the root) at `commit`, `None` if absent.
    pub fn file_at(&self, commit: &str, path: &Path) -> Result<Option<Vec<u8>>, PhylumCiError> {
        let tree = self
            .commit(commit)?
            .tree()
            .map_err(|e| PhylumCiError::Git(format!("failed to get tree: {e}")))?;
        let entry = match tree.get_path(path) {
            Ok(entry) => entry,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
            Err(e) => {
                return Err(PhylumCiError::Git(format!(
                    "failed to look up {}: {e}",
                    path.display()
                )))
            }
        };
        let object = entry
            .to_object(&self.repo)
            .map_err(|e| PhylumCiError::Git(format!("failed to load {}: {e}", path.display())))?;
        Ok(object.as_blob().map(|blob| blob.content().to_vec()))
    }

    /// Path relative to the work tree root, for paths given relative to the
    /// current directory or absolute.
    pub fn relative_path(&self, path: &Path) -> PathBuf {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        };
        let root = self.root.canonicalize().unwrap_or_else(|_| self.root.clone());
        let absolute = absolute.canonicalize().unwrap_or(absolute);
        absolute
            .strip_prefix(&root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.to_path_buf())
    }

    fn oid(&self, sha: &str) -> Result<Oid, PhylumCiError> {
        Oid::from_str(sha).map_err(|e| PhylumCiError::Git(format!("invalid object id {sha}: {e}")))
    }

    fn commit(&self, spec: &str) -> Result<Commit<'_>, PhylumCiError> {
        let sha = self.resolve(spec)?;
        self.repo
            .find_commit(self.oid(&sha)?)
            .map_err(|e| PhylumCiError::Git(format!("failed to find commit {sha}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discover_outside_repo_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = GitRepo::discover(dir.path());
        assert!(matches!(result, Err(PhylumCiError::Git(_))));
    }

    #[test]
    fn unborn_head_has_no_commit() {
        let dir = tempfile::tempdir().unwrap();
        Repository::init(dir.path()).unwrap();
        let repo = GitRepo::discover(dir.path()).unwrap();
        assert!(repo.head_commit().is_err());
        assert!(repo.staged_files().unwrap().is_empty());
    }

    #[test]
    fn resolve_unknown_ref_mentions_fetch() {
        let dir = tempfile::tempdir().unwrap();
        Repository::init(dir.path()).unwrap();
        let repo = GitRepo::discover(dir.path()).unwrap();
        let err = repo.resolve("feature/missing").unwrap_err();
        assert!(err.to_string().contains("feature/missing"));
        assert!(err.to_string().contains("fetched"));
    }
}
