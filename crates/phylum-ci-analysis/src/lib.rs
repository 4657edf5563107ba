//! Dependency analysis for phylum-ci.
//!
//! Drives the `phylum` CLI over the dependency files a change touches and
//! turns the resulting job into a verdict on the newly introduced packages.

pub mod cli;
pub mod diff;
pub mod install;
pub mod pipeline;
pub mod policy;
pub mod report;

pub use cli::{AnalyzeRequest, PhylumCli};
pub use diff::DependencyDiff;
pub use pipeline::{AnalysisPipeline, PipelineOptions, PipelineResult, RunOutcome};
pub use policy::{evaluate, PackageEvaluation, PolicyReport, Violation};
