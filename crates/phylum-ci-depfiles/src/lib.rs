//! Dependency file detection and preparation.
//!
//! Classifies manifests and lockfiles by name, discovers them in a work tree,
//! applies exclusion globs, decides which ones a change touched, and
//! materializes lockfiles for manifests through the ecosystem's own tooling.

pub mod catalog;
pub mod discover;
pub mod filter;
pub mod generate;

pub use catalog::{Depfile, DepfileKind};
pub use discover::{changed_depfiles, discover_depfiles};
pub use filter::DepfileFilter;
pub use generate::{GeneratedLockfile, GeneratorSpec};
