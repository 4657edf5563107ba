//! Shared types, configuration, and errors for phylum-ci.
//!
//! [`PhylumCiError`] is the error type of every crate in the workspace and
//! carries the process exit code through [`PhylumCiError::return_code`].
//! [`CiConfig`] reads `.phylum-ci.toml`; [`ProjectSettings`] reads the
//! `.phylum_project` file the phylum CLI writes.

mod config;
mod error;
mod project;
mod types;

pub use config::{AnalysisConfig, CiConfig, CommentConfig, PhylumConfig, CONFIG_FILE_NAME};
pub use error::PhylumCiError;
pub use project::{ProjectSettings, PROJECT_FILE_NAME};
pub use types::{
    Ecosystem, Issue, JobResult, JobStatus, OutputFormat, Package, PackageId, PackageOrigin,
    PackageResult, PackageStatus, ReturnCode, RiskDomain, RiskScores, Thresholds, Verdict,
};

/// A convenience `Result` type for phylum-ci operations.
pub type Result<T> = std::result::Result<T, PhylumCiError>;
