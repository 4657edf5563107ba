//! End-to-end analysis of a change.

use std::collections::BTreeSet;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use phylum_ci_core::{JobResult, Package, PhylumCiError, ReturnCode, Thresholds};
use phylum_ci_depfiles::{changed_depfiles, discover_depfiles, Depfile, DepfileFilter, GeneratorSpec};
use phylum_ci_git::GitRepo;
use phylum_ci_platforms::{ChangeContext, ChangeKind, CiPlatform, CommentOutcome};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cli::{AnalyzeRequest, PhylumCli};
use crate::diff::DependencyDiff;
use crate::policy::{evaluate, PolicyReport};
use crate::report::format_markdown;

/// Settings for one run, already merged from flags, environment, and files.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Dependency files given explicitly; discovery is skipped when set.
    pub depfiles: Vec<PathBuf>,
    /// Glob patterns excluded from discovery.
    pub exclude: Vec<String>,
    /// Staged files passed by a pre-commit hook.
    pub staged_files: Vec<PathBuf>,
    pub thresholds: Thresholds,
    /// Evaluate existing dependencies as well as new ones.
    pub all_deps: bool,
    /// Analyze even when no dependency file changed.
    pub force_analysis: bool,
    /// Report without failing.
    pub audit: bool,
    /// Generate lockfiles for manifests.
    pub generate_lockfiles: bool,
    /// Post a pull request comment.
    pub comment: bool,
    pub project: Option<String>,
    pub group: Option<String>,
    pub org: Option<String>,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
    /// Show a spinner on stderr while waiting for results.
    pub progress: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            depfiles: Vec::new(),
            exclude: Vec::new(),
            staged_files: Vec::new(),
            thresholds: Thresholds::default(),
            all_deps: false,
            force_analysis: false,
            audit: false,
            generate_lockfiles: true,
            comment: true,
            project: None,
            group: None,
            org: None,
            poll_interval: Duration::from_secs(5),
            poll_timeout: Duration::from_secs(600),
            progress: false,
        }
    }
}

/// What a run ended with.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// No dependency file changed.
    NoChanges,
    /// Dependency files changed without introducing dependencies.
    NoNewDependencies,
    /// Dependencies were analyzed.
    Analyzed {
        report: PolicyReport,
        /// Result of posting the comment, `None` when not attempted.
        comment: Option<CommentOutcome>,
    },
}

/// Outcome and exit code of a run.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub outcome: RunOutcome,
    pub return_code: ReturnCode,
}

impl PipelineResult {
    fn success(outcome: RunOutcome) -> Self {
        Self {
            outcome,
            return_code: ReturnCode::Success,
        }
    }

    /// The policy report, when dependencies were analyzed.
    pub fn report(&self) -> Option<&PolicyReport> {
        match &self.outcome {
            RunOutcome::Analyzed { report, .. } => Some(report),
            _ => None,
        }
    }
}

/// A dependency file prepared for parsing and analysis.
struct Target {
    depfile: Depfile,
    /// File handed to the phylum CLI: the depfile itself or a generated lockfile.
    analysis_path: PathBuf,
}

/// Drives a run from change detection to exit code.
///
/// # Examples
///
/// ```no_run
/// use std::path::{Path, PathBuf};
/// use phylum_ci_analysis::{AnalysisPipeline, PhylumCli, PipelineOptions};
/// use phylum_ci_git::GitRepo;
/// use phylum_ci_platforms::{detect, EnvVars, RepoInfo};
///
/// # async fn run() -> Result<(), phylum_ci_core::PhylumCiError> {
/// let repo = GitRepo::discover(Path::new("."))?;
/// let platform = detect(&EnvVars::from_process(), &RepoInfo::default(), false)?;
/// let cli = PhylumCli::new(PathBuf::from("phylum")).with_token(Some("token".into()));
/// let pipeline = AnalysisPipeline::new(&repo, platform.as_ref(), &cli, PipelineOptions::default());
/// let result = pipeline.run().await?;
/// std::process::exit(result.return_code.code());
/// # }
/// ```
pub struct AnalysisPipeline<'a> {
    repo: &'a GitRepo,
    platform: &'a dyn CiPlatform,
    cli: &'a PhylumCli,
    options: PipelineOptions,
}

impl<'a> AnalysisPipeline<'a> {
    pub fn new(
        repo: &'a GitRepo,
        platform: &'a dyn CiPlatform,
        cli: &'a PhylumCli,
        options: PipelineOptions,
    ) -> Self {
        Self {
            repo,
            platform,
            cli,
            options,
        }
    }

    /// Run the analysis.
    ///
    /// # Errors
    ///
    /// Returns the [`PhylumCiError`] of the first failing step; its
    /// [`PhylumCiError::return_code`] is the process exit code.
    pub async fn run(&self) -> Result<PipelineResult, PhylumCiError> {
        let opts = &self.options;
        if !self.cli.has_token() {
            return Err(PhylumCiError::MissingPhylumToken);
        }

        let ctx = self.platform.context();
        info!(platform = self.platform.name(), change = %ctx.kind, label = ctx.label.as_str(), "analyzing change");
        let will_comment = opts.comment && ctx.is_pull_request();
        if will_comment && self.platform.requires_token() && !self.platform.has_token() {
            return Err(PhylumCiError::MissingCiToken {
                platform: self.platform.name().to_string(),
                env_var: self.platform.token_env_var().unwrap_or("a CI token").to_string(),
            });
        }

        let (base, changed) = self.resolve_change(&ctx)?;
        debug!(base = base.as_deref().unwrap_or("none"), changed = changed.len(), "resolved change");

        let depfiles = self.determine_depfiles()?;
        let touched = changed_depfiles(&depfiles, &changed);
        if touched.is_empty() && !opts.force_analysis {
            info!("no dependency file changed");
            return Ok(PipelineResult::success(RunOutcome::NoChanges));
        }
        let selected = if opts.force_analysis || opts.all_deps {
            depfiles
        } else {
            touched
        };

        let staging = tempfile::tempdir()?;
        let targets = self.prepare_targets(selected, staging.path())?;

        let mut current = Vec::new();
        for target in &targets {
            let mut packages = self.cli.parse(&target.analysis_path).await?;
            for pkg in &mut packages {
                pkg.depfile = Some(target.depfile.path.clone());
            }
            current.extend(packages);
        }
        let base_packages = match &base {
            Some(commit) => self.base_packages(commit, &targets).await?,
            None => Vec::new(),
        };
        let diff = DependencyDiff::compute(&current, &base_packages);
        info!(
            new = diff.new.len(),
            existing = diff.existing.len(),
            removed = diff.removed.len(),
            "computed dependency changes"
        );
        if !diff.has_new() && !opts.all_deps && !opts.force_analysis {
            return Ok(PipelineResult::success(RunOutcome::NoNewDependencies));
        }

        if let Some(project) = &opts.project {
            self.cli
                .ensure_project(project, opts.group.as_deref(), opts.org.as_deref())
                .await?;
        }
        let request = AnalyzeRequest {
            label: ctx.label.clone(),
            project: opts.project.clone(),
            group: opts.group.clone(),
            org: opts.org.clone(),
        };
        let paths: Vec<PathBuf> = targets.iter().map(|t| t.analysis_path.clone()).collect();
        let job = self.cli.analyze(&paths, &request).await?;
        let job = self.poll(job).await?;

        let evaluated = if opts.all_deps { diff.current() } else { diff.new };
        let mut report = evaluate(&job, &evaluated, &opts.thresholds, opts.all_deps);
        if report.label.is_none() {
            report.label = Some(ctx.label.clone());
        }
        info!(verdict = %report.verdict, "evaluated dependencies");

        let comment = if will_comment {
            let outcome = self.platform.post_comment(&format_markdown(&report)).await?;
            debug!(?outcome, "comment step finished");
            Some(outcome)
        } else {
            None
        };

        let return_code = report.return_code(opts.audit);
        Ok(PipelineResult {
            outcome: RunOutcome::Analyzed { report, comment },
            return_code,
        })
    }

    /// Base commit (if any) and the paths changed relative to it.
    fn resolve_change(
        &self,
        ctx: &ChangeContext,
    ) -> Result<(Option<String>, BTreeSet<PathBuf>), PhylumCiError> {
        if ctx.kind == ChangeKind::Staged {
            let base = self.repo.head_commit().ok();
            let changed = if self.options.staged_files.is_empty() {
                self.repo.staged_paths()?
            } else {
                self.options
                    .staged_files
                    .iter()
                    .map(|p| self.repo.relative_path(p))
                    .collect()
            };
            return Ok((base, changed));
        }

        let head = match &ctx.head_ref {
            Some(head) => self.repo.resolve(head)?,
            None => self.repo.head_commit()?,
        };
        let base_spec = match &ctx.base_ref {
            Some(base) => base.clone(),
            None => self.repo.default_branch().ok_or_else(|| {
                PhylumCiError::Git(
                    "unable to determine the default branch to compare against".into(),
                )
            })?,
        };
        let base = self.repo.merge_base(&base_spec, &head)?;
        let changed = self.repo.changed_paths(&base, &head)?;
        Ok((Some(base), changed))
    }

    fn determine_depfiles(&self) -> Result<Vec<Depfile>, PhylumCiError> {
        let root = self.repo.root();
        let filter = DepfileFilter::new(&self.options.exclude)?;
        let depfiles = if self.options.depfiles.is_empty() {
            discover_depfiles(root, &filter)?
        } else {
            let mut provided = Vec::new();
            for path in &self.options.depfiles {
                let relative = self.repo.relative_path(path);
                if !root.join(&relative).is_file() {
                    return Err(PhylumCiError::FileNotFound(path.clone()));
                }
                if let Some(pattern) = filter.matching_pattern(&relative) {
                    info!(path = %relative.display(), %pattern, "excluding provided dependency file");
                    continue;
                }
                provided.push(Depfile::provided(relative));
            }
            provided
        };
        if depfiles.is_empty() {
            return Err(PhylumCiError::NoDepfiles);
        }
        for depfile in &depfiles {
            debug!(%depfile, "dependency file");
        }
        Ok(depfiles)
    }

    fn prepare_targets(
        &self,
        depfiles: Vec<Depfile>,
        staging: &Path,
    ) -> Result<Vec<Target>, PhylumCiError> {
        let root = self.repo.root();
        let mut targets = Vec::with_capacity(depfiles.len());
        for depfile in depfiles {
            let generator = self
                .options
                .generate_lockfiles
                .then(|| GeneratorSpec::for_manifest(&depfile))
                .flatten();
            let analysis_path = match generator {
                Some(spec) => {
                    let generated = spec.run(root, &depfile)?;
                    write_staged(staging, &generated.path, &generated.contents)?
                }
                None => root.join(&depfile.path),
            };
            targets.push(Target {
                depfile,
                analysis_path,
            });
        }
        Ok(targets)
    }

    /// Dependencies of the targets as of `commit`.
    ///
    /// Base content is materialized in a scratch directory so the work tree is
    /// never touched. Manifests that fail to resolve at the base contribute
    /// nothing, which makes all their current dependencies new.
    async fn base_packages(
        &self,
        commit: &str,
        targets: &[Target],
    ) -> Result<Vec<Package>, PhylumCiError> {
        let scratch = tempfile::tempdir()?;
        let mut packages = Vec::new();
        for target in targets {
            let depfile = &target.depfile;
            let Some(contents) = self.repo.file_at(commit, &depfile.path)? else {
                debug!(path = %depfile.path.display(), "absent at base");
                continue;
            };
            let base_path = write_staged(scratch.path(), &depfile.path, &contents)?;

            let parse_path = match self
                .options
                .generate_lockfiles
                .then(|| GeneratorSpec::for_manifest(depfile))
                .flatten()
            {
                Some(spec) => match spec.run(scratch.path(), depfile) {
                    Ok(generated) => {
                        write_staged(scratch.path(), &generated.path, &generated.contents)?
                    }
                    Err(e) => {
                        warn!(path = %depfile.path.display(), error = %e, "could not resolve manifest at base; treating its dependencies as new");
                        continue;
                    }
                },
                None => base_path,
            };
            match self.cli.parse(&parse_path).await {
                Ok(found) => packages.extend(found),
                Err(e) => {
                    warn!(path = %depfile.path.display(), error = %e, "could not parse base version; treating its dependencies as new");
                }
            }
        }
        Ok(packages)
    }

    /// Re-query a pending job until it completes or the timeout passes.
    async fn poll(&self, mut job: JobResult) -> Result<JobResult, PhylumCiError> {
        if !job.is_pending() {
            return Ok(job);
        }
        let opts = &self.options;
        let started = Instant::now();
        let spinner = (opts.progress && std::io::stderr().is_terminal()).then(|| {
            let pb = indicatif::ProgressBar::new_spinner();
            pb.set_style(
                indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
                    .unwrap_or_else(|_| indicatif::ProgressStyle::default_spinner()),
            );
            pb.set_message("Waiting for Phylum analysis...");
            pb.enable_steady_tick(Duration::from_millis(120));
            pb
        });

        while job.is_pending() && started.elapsed() + opts.poll_interval <= opts.poll_timeout {
            tokio::time::sleep(opts.poll_interval).await;
            let next = self.cli.job_status(&job.job_id).await.inspect_err(|_e| {
                if let Some(pb) = &spinner {
                    pb.finish_with_message("Failed");
                }
            })?;
            let remaining = next.packages.iter().filter(|p| !p.is_complete()).count();
            debug!(job = next.job_id.as_str(), remaining, "polled job");
            job = next;
        }

        if let Some(pb) = spinner {
            pb.finish_with_message(if job.is_pending() { "Timed out" } else { "Done" });
        }
        if job.is_pending() {
            warn!(
                job = job.job_id.as_str(),
                timeout_secs = opts.poll_timeout.as_secs(),
                "analysis still processing; continuing with partial results"
            );
        }
        Ok(job)
    }
}

fn write_staged(dir: &Path, relative: &Path, contents: &[u8]) -> Result<PathBuf, PhylumCiError> {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, contents)?;
    Ok(path)
}
