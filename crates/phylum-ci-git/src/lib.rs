//! Git plumbing for change detection.
//!
//! Wraps `git2` to answer the questions a CI run needs: which commit is the
//! base of this change, which files changed between two refs, what is staged,
//! and what a file looked like at the base.

pub mod changes;
pub mod repo;

pub use changes::{ChangeStatus, ChangedFile};
pub use repo::GitRepo;
