use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use phylum_ci_analysis::report::{format_json, format_outcome_markdown, format_outcome_text};
use phylum_ci_analysis::{install, AnalysisPipeline, PhylumCli, PipelineOptions};
use phylum_ci_core::{
    CiConfig, OutputFormat, PhylumCiError, ProjectSettings, ReturnCode, RiskDomain, Thresholds,
    CONFIG_FILE_NAME, PROJECT_FILE_NAME,
};
use phylum_ci_depfiles::{discover_depfiles, DepfileFilter};
use phylum_ci_git::GitRepo;
use phylum_ci_platforms::{detect, CiPlatform, EnvVars, RepoInfo};

const EXIT_CODES: &str = "Exit codes:\n  \
     0   analysis passed, nothing to analyze, or audit mode\n  \
     1   a dependency failed the risk thresholds (see --exit-code)\n  \
     2   invalid arguments\n  \
     10  no Phylum API token\n  \
     11  comment posting needs a CI token that was not provided\n  \
     12  no dependency files found or provided\n  \
     13  git repository or ref resolution failed\n  \
     14  the phylum CLI failed\n  \
     15  the CI provider API failed\n  \
     20  unexpected error";

#[derive(Parser)]
#[command(
    name = "phylum-ci",
    version,
    about = "Analyze dependency changes with Phylum in CI",
    long_about = "Analyze dependency changes with Phylum in CI.\n\n\
                   Detects the CI environment, finds the dependency files changed by the pull\n\
                   request or push, submits their dependencies to Phylum through the phylum CLI,\n\
                   and reports the verdict as the exit code and a pull request comment.\n\n\
                   Examples:\n  \
                     phylum-ci                          Analyze the current change\n  \
                     phylum-ci --mal-threshold 80       Fail on new malicious-code risk\n  \
                     phylum-ci -d package-lock.json     Analyze a specific lockfile\n  \
                     phylum-ci --audit --format json    Report without failing\n  \
                     phylum-ci doctor                   Check setup and environment",
    after_long_help = EXIT_CODES,
    args_conflicts_with_subcommands = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    analyze: AnalyzeArgs,

    /// Path to configuration file (default: .phylum-ci.toml at the repository root)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for the analysis result.\n\n\
                       Formats:\n  \
                         text      Human-readable summary (default)\n  \
                         json      Machine-readable JSON with camelCase keys\n  \
                         markdown  The pull request comment body"
    )]
    format: OutputFormat,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(long, short, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(long, short, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(clap::Args, Default)]
struct AnalyzeArgs {
    /// Dependency file to analyze; repeat for several (default: discover)
    #[arg(short = 'd', long = "depfile")]
    depfiles: Vec<PathBuf>,

    /// Glob pattern of paths to skip during discovery; repeatable
    #[arg(short = 'e', long)]
    exclude: Vec<String>,

    /// Minimum vulnerability score (0-100, 0 disables)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    vul_threshold: Option<u8>,

    /// Minimum malicious code score (0-100, 0 disables)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    mal_threshold: Option<u8>,

    /// Minimum engineering score (0-100, 0 disables)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    eng_threshold: Option<u8>,

    /// Minimum license score (0-100, 0 disables)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    lic_threshold: Option<u8>,

    /// Minimum author score (0-100, 0 disables)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    aut_threshold: Option<u8>,

    /// Evaluate all dependencies, not only new ones
    #[arg(short = 'a', long)]
    all_deps: bool,

    /// Analyze even when no dependency file changed
    #[arg(short = 'f', long)]
    force_analysis: bool,

    /// Install the phylum CLI even if one is already present
    #[arg(short = 'i', long)]
    force_install: bool,

    /// phylum CLI release to install (default: latest)
    #[arg(short = 'r', long)]
    phylum_release: Option<String>,

    /// Phylum API token
    #[arg(short = 'k', long, env = "PHYLUM_API_KEY", hide_env_values = true)]
    phylum_token: Option<String>,

    /// Phylum API URI
    #[arg(short = 'u', long)]
    phylum_uri: Option<String>,

    /// Phylum project (default: from .phylum_project)
    #[arg(short = 'p', long)]
    project: Option<String>,

    /// Phylum group owning the project
    #[arg(short = 'g', long)]
    group: Option<String>,

    /// Phylum organization owning the group
    #[arg(long)]
    org: Option<String>,

    /// Report results without failing the build
    #[arg(long)]
    audit: bool,

    /// Do not generate lockfiles for manifests
    #[arg(long)]
    no_generation: bool,

    /// Do not post a pull request comment
    #[arg(long)]
    no_comment: bool,

    /// Path to an existing phylum executable
    #[arg(long)]
    phylum_bin: Option<PathBuf>,

    /// Exit code to use when a dependency fails the thresholds
    #[arg(long, value_name = "N")]
    exit_code: Option<i32>,

    /// Staged files, as passed by a pre-commit hook
    files: Vec<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Create a .phylum-ci.toml configuration file
    #[command(long_about = "Create a .phylum-ci.toml configuration file.\n\n\
        Writes a commented template with every option in the current directory.\n\
        Fails if the file already exists.")]
    Init,
    /// Check your phylum-ci setup and environment
    #[command(long_about = "Check your phylum-ci setup and environment.\n\n\
        Reports the git repository, configuration file, detected CI platform,\n\
        Phylum and CI tokens, the phylum CLI, and discovered dependency files.\n\
        Use --format json for machine-readable output.")]
    Doctor,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

const DEFAULT_CONFIG: &str = r#"# phylum-ci configuration
# Command-line flags take precedence over these settings.

[analysis]
# depfiles = ["package-lock.json", "backend/poetry.lock"]
# exclude = ["fixtures/**", "docs/**"]
# all_deps = false
# audit = false
# force_analysis = false
# generate_lockfiles = true
# poll_interval_secs = 5
# poll_timeout_secs = 600

# Minimum acceptable score per risk domain, 0-100. 0 disables a domain.
[thresholds]
# vulnerability = 0
# malicious_code = 0
# engineering = 0
# license = 0
# author = 0

[phylum]
# release = "latest"
# uri = "https://api.phylum.io"
# project = "my-project"
# group = "my-group"
# org = "my-org"
# bin = "/usr/local/bin/phylum"

[comment]
# enabled = true
"#;

fn init_tracing(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

/// Attach a hint to the errors a user can fix.
fn diagnostic(err: &PhylumCiError) -> miette::Report {
    match err {
        PhylumCiError::MissingPhylumToken => miette::miette!(
            help = "Pass --phylum-token or set PHYLUM_API_KEY. Create a token with `phylum auth create-token`.",
            "{}",
            err
        ),
        PhylumCiError::MissingCiToken { env_var, .. } => miette::miette!(
            help = format!("Set {env_var}, or pass --no-comment to skip the pull request comment."),
            "{}",
            err
        ),
        PhylumCiError::Git(_) => miette::miette!(
            help = "Shallow clones often lack the base commit. Fetch full history (e.g. `fetch-depth: 0`).",
            "{}",
            err
        ),
        PhylumCiError::NoDepfiles => miette::miette!(
            help = "Name dependency files with --depfile or check the exclude patterns.",
            "{}",
            err
        ),
        _ => miette::miette!("{}", err),
    }
}

fn merge_thresholds(config: Thresholds, args: &AnalyzeArgs) -> Thresholds {
    let mut thresholds = config;
    let overrides = [
        (RiskDomain::Vulnerability, args.vul_threshold),
        (RiskDomain::MaliciousCode, args.mal_threshold),
        (RiskDomain::Engineering, args.eng_threshold),
        (RiskDomain::License, args.lic_threshold),
        (RiskDomain::Author, args.aut_threshold),
    ];
    for (domain, value) in overrides {
        if let Some(value) = value {
            thresholds.set(domain, value);
        }
    }
    thresholds
}

/// Flags over `.phylum-ci.toml` over `.phylum_project` over defaults.
fn pipeline_options(
    args: &AnalyzeArgs,
    config: &CiConfig,
    project: Option<&ProjectSettings>,
    root: &Path,
) -> PipelineOptions {
    let depfiles = if args.depfiles.is_empty() {
        config
            .analysis
            .depfiles
            .iter()
            .map(|p| if p.is_absolute() { p.clone() } else { root.join(p) })
            .collect()
    } else {
        args.depfiles.clone()
    };
    let mut exclude = config.analysis.exclude.clone();
    exclude.extend(args.exclude.iter().cloned());

    PipelineOptions {
        depfiles,
        exclude,
        staged_files: args.files.clone(),
        thresholds: merge_thresholds(config.thresholds, args),
        all_deps: args.all_deps || config.analysis.all_deps,
        force_analysis: args.force_analysis || config.analysis.force_analysis,
        audit: args.audit || config.analysis.audit,
        generate_lockfiles: !args.no_generation && config.analysis.generate_lockfiles,
        comment: !args.no_comment && config.comment.enabled,
        project: args
            .project
            .clone()
            .or_else(|| config.phylum.project.clone())
            .or_else(|| project.map(|p| p.name.clone())),
        group: args
            .group
            .clone()
            .or_else(|| config.phylum.group.clone())
            .or_else(|| project.and_then(|p| p.group.clone())),
        org: args.org.clone().or_else(|| config.phylum.org.clone()),
        poll_interval: Duration::from_secs(config.analysis.poll_interval_secs),
        poll_timeout: Duration::from_secs(config.analysis.poll_timeout_secs),
        progress: true,
    }
}

fn repo_info(repo: &GitRepo) -> RepoInfo {
    RepoInfo {
        branch: repo.current_branch(),
        head_sha: repo.head_commit().ok(),
    }
}

/// Use an existing phylum CLI, or install the configured release.
async fn phylum_bin(args: &AnalyzeArgs, config: &CiConfig) -> Result<PathBuf, PhylumCiError> {
    let release = args
        .phylum_release
        .as_deref()
        .unwrap_or(config.phylum.release.as_str());
    if args.force_install {
        return install::install(release).await;
    }
    let explicit = args.phylum_bin.as_deref().or(config.phylum.bin.as_deref());
    let path_var = std::env::var_os("PATH");
    let home = install::home_dir();
    if let Some(found) = PhylumCli::locate(explicit, path_var.as_deref(), home.as_deref()) {
        debug!(bin = %found.display(), "using existing phylum CLI");
        return Ok(found);
    }
    if let Some(path) = explicit {
        return Err(PhylumCiError::PhylumCli(format!(
            "phylum CLI not found at {}",
            path.display()
        )));
    }
    info!(release, "phylum CLI not found; installing");
    install::install(release).await
}

async fn run_analysis(
    args: &AnalyzeArgs,
    config_path: Option<&Path>,
    format: OutputFormat,
) -> Result<i32, PhylumCiError> {
    let cwd = std::env::current_dir()?;
    let repo = GitRepo::discover(&cwd)?;
    let config = CiConfig::load(config_path, repo.root())?;
    let project = ProjectSettings::load(repo.root())?;
    if let Some(settings) = &project {
        debug!(project = settings.name.as_str(), "loaded {PROJECT_FILE_NAME}");
    }

    let token = args.phylum_token.clone().filter(|t| !t.trim().is_empty());
    if token.is_none() {
        return Err(PhylumCiError::MissingPhylumToken);
    }

    let platform = detect(&EnvVars::from_process(), &repo_info(&repo), !args.files.is_empty())?;
    let bin = phylum_bin(args, &config).await?;
    let cli = PhylumCli::new(bin)
        .with_token(token)
        .with_uri(args.phylum_uri.clone().or_else(|| config.phylum.uri.clone()))
        .with_workdir(repo.root());
    match cli.version().await {
        Ok(version) => info!(version = version.as_str(), "phylum CLI ready"),
        Err(e) => warn!(error = %e, "could not determine phylum CLI version"),
    }

    let options = pipeline_options(args, &config, project.as_ref(), repo.root());
    let result = AnalysisPipeline::new(&repo, platform.as_ref(), &cli, options)
        .run()
        .await?;

    let output = match format {
        OutputFormat::Json => format_json(&result)?,
        OutputFormat::Markdown => format_outcome_markdown(&result.outcome),
        OutputFormat::Text => format_outcome_text(&result.outcome),
    };
    print!("{output}");
    if !output.ends_with('\n') {
        println!();
    }

    info!(return_code = %result.return_code, "finished");
    Ok(match (result.return_code, args.exit_code) {
        (ReturnCode::PolicyFailure, Some(code)) => code,
        (code, _) => code.code(),
    })
}

/// Write the default config to `--config`, or to the repository root where
/// analysis looks for it. Outside a repository the current directory is used.
fn run_init(config_path: Option<&Path>) -> Result<i32, PhylumCiError> {
    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => {
            let cwd = std::env::current_dir()?;
            match GitRepo::discover(&cwd) {
                Ok(repo) => repo.root().join(CONFIG_FILE_NAME),
                Err(e) => {
                    debug!(error = %e, "not in a repository, writing config to the current directory");
                    cwd.join(CONFIG_FILE_NAME)
                }
            }
        }
    };
    let path = path.as_path();
    if path.exists() {
        return Err(PhylumCiError::Config(format!(
            "{} already exists",
            path.display()
        )));
    }
    std::fs::write(path, DEFAULT_CONFIG)?;
    println!("Created {} with default configuration", path.display());
    Ok(0)
}

#[derive(serde::Serialize)]
struct CheckResult {
    name: &'static str,
    status: &'static str,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
}

impl CheckResult {
    fn pass(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: "pass",
            detail: detail.into(),
            hint: None,
        }
    }

    fn fail(name: &'static str, detail: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            name,
            status: "fail",
            detail: detail.into(),
            hint: Some(hint.into()),
        }
    }

    fn info(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: "info",
            detail: detail.into(),
            hint: None,
        }
    }

    fn symbol(&self, use_color: bool) -> &'static str {
        match (self.status, use_color) {
            ("pass", true) => "\x1b[32m\u{2713}\x1b[0m",
            ("pass", false) => "\u{2713}",
            ("fail", true) => "\x1b[31m\u{2717}\x1b[0m",
            ("fail", false) => "\u{2717}",
            (_, true) => "\x1b[33m~\x1b[0m",
            (_, false) => "~",
        }
    }
}

async fn run_doctor(
    args: &AnalyzeArgs,
    config_path: Option<&Path>,
    format: OutputFormat,
) -> Result<i32, PhylumCiError> {
    let mut checks = Vec::new();
    let cwd = std::env::current_dir()?;

    let repo = match GitRepo::discover(&cwd) {
        Ok(repo) => {
            checks.push(CheckResult::pass(
                "git_repository",
                format!("detected at {}", repo.root().display()),
            ));
            Some(repo)
        }
        Err(e) => {
            checks.push(CheckResult::fail(
                "git_repository",
                e.to_string(),
                "Run phylum-ci inside a git checkout.",
            ));
            None
        }
    };
    let root = repo.as_ref().map_or(cwd.as_path(), GitRepo::root);

    let config = match CiConfig::load(config_path, root) {
        Ok(config) => {
            let path = config_path
                .map(Path::to_path_buf)
                .unwrap_or_else(|| root.join(CONFIG_FILE_NAME));
            if path.exists() {
                checks.push(CheckResult::pass("config_file", format!("{} is valid", path.display())));
            } else {
                checks.push(CheckResult::info("config_file", "not found, using defaults"));
            }
            config
        }
        Err(e) => {
            checks.push(CheckResult::fail(
                "config_file",
                e.to_string(),
                "Fix the file or regenerate it with `phylum-ci init`.",
            ));
            CiConfig::default()
        }
    };

    let info = repo.as_ref().map(repo_info).unwrap_or_default();
    let platform: Option<Box<dyn CiPlatform>> =
        match detect(&EnvVars::from_process(), &info, !args.files.is_empty()) {
            Ok(platform) => {
                let ctx = platform.context();
                checks.push(CheckResult::pass(
                    "ci_platform",
                    format!("{} ({}, label {})", platform.name(), ctx.kind, ctx.label),
                ));
                Some(platform)
            }
            Err(e) => {
                checks.push(CheckResult::fail(
                    "ci_platform",
                    e.to_string(),
                    "Check the CI provider environment variables.",
                ));
                None
            }
        };

    let token = args
        .phylum_token
        .clone()
        .or_else(|| std::env::var("PHYLUM_API_KEY").ok());
    if token.is_some_and(|t| !t.trim().is_empty()) {
        checks.push(CheckResult::pass("phylum_token", "provided"));
    } else {
        checks.push(CheckResult::fail(
            "phylum_token",
            "not set",
            "Pass --phylum-token or set PHYLUM_API_KEY.",
        ));
    }

    if let Some(platform) = &platform {
        if !platform.requires_token() {
            checks.push(CheckResult::info("ci_token", "not needed"));
        } else if platform.has_token() {
            checks.push(CheckResult::pass("ci_token", "provided"));
        } else {
            let var = platform.token_env_var().unwrap_or("the provider token");
            checks.push(CheckResult::fail(
                "ci_token",
                "not set",
                format!("Set {var} to post pull request comments."),
            ));
        }
    }

    let explicit = args.phylum_bin.as_deref().or(config.phylum.bin.as_deref());
    let path_var = std::env::var_os("PATH");
    let home = install::home_dir();
    match PhylumCli::locate(explicit, path_var.as_deref(), home.as_deref()) {
        Some(bin) => match PhylumCli::new(bin.clone()).version().await {
            Ok(version) => checks.push(CheckResult::pass(
                "phylum_cli",
                format!("{version} at {}", bin.display()),
            )),
            Err(e) => checks.push(CheckResult::fail(
                "phylum_cli",
                e.to_string(),
                "Reinstall with --force-install.",
            )),
        },
        None => checks.push(CheckResult::info(
            "phylum_cli",
            format!("not found; release {} will be installed", config.phylum.release),
        )),
    }

    if repo.is_some() {
        let mut exclude = config.analysis.exclude.clone();
        exclude.extend(args.exclude.iter().cloned());
        match DepfileFilter::new(&exclude).and_then(|f| discover_depfiles(root, &f)) {
            Ok(found) if found.is_empty() => checks.push(CheckResult::fail(
                "depfiles",
                "none found",
                "Name dependency files with --depfile.",
            )),
            Ok(found) => {
                let names: Vec<String> = found.iter().map(ToString::to_string).collect();
                checks.push(CheckResult::pass("depfiles", names.join(", ")));
            }
            Err(e) => checks.push(CheckResult::fail(
                "depfiles",
                e.to_string(),
                "Check the exclude patterns.",
            )),
        }
    }

    let failed = checks.iter().filter(|c| c.status == "fail").count();
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&checks)?),
        OutputFormat::Text | OutputFormat::Markdown => {
            let use_color = std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none();
            for check in &checks {
                println!("{} {}: {}", check.symbol(use_color), check.name, check.detail);
                if let Some(hint) = &check.hint {
                    println!("    {hint}");
                }
            }
            if failed == 0 {
                println!("\nAll checks passed.");
            } else {
                println!("\n{failed} check(s) failed.");
            }
        }
    }
    Ok(if failed == 0 { 0 } else { 1 })
}

async fn run(cli: Cli) -> Result<i32, PhylumCiError> {
    let config = cli.config.as_deref();
    match cli.command {
        None => run_analysis(&cli.analyze, config, cli.format).await,
        Some(Command::Init) => run_init(config),
        Some(Command::Doctor) => run_doctor(&cli.analyze, config, cli.format).await,
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "phylum-ci", &mut std::io::stdout());
            Ok(0)
        }
    }
}

#[tokio::main]
async fn main() {
    let _ = miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }));
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let code = match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            let code = err.return_code();
            eprintln!("{:?}", diagnostic(&err));
            debug!(return_code = %code, "exiting with error");
            code.code()
        }
    };
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_template_parses() {
        let config = CiConfig::from_toml(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.phylum.release, "latest");
        assert!(config.comment.enabled);
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_config_thresholds() {
        let cli = Cli::parse_from(["phylum-ci", "--mal-threshold", "90", "--vul-threshold", "0"]);
        let config = Thresholds {
            vulnerability: 50,
            engineering: 40,
            ..Thresholds::default()
        };
        let merged = merge_thresholds(config, &cli.analyze);
        assert_eq!(merged.malicious_code, 90);
        assert_eq!(merged.vulnerability, 0);
        assert_eq!(merged.engineering, 40);
    }

    #[test]
    fn threshold_above_100_is_rejected() {
        assert!(Cli::try_parse_from(["phylum-ci", "--lic-threshold", "101"]).is_err());
    }

    #[test]
    fn options_layer_flags_config_and_project_file() {
        let cli = Cli::parse_from(["phylum-ci", "--group", "cli-group", "--no-comment", "-e", "b/**"]);
        let config = CiConfig::from_toml(
            "[analysis]\nexclude = [\"a/**\"]\ndepfiles = [\"web/package-lock.json\"]\n\
             [phylum]\nproject = \"from-config\"\n",
        )
        .unwrap();
        let project = ProjectSettings::from_yaml("name: from-file\ngroup: file-group\n").unwrap();
        let root = Path::new("/repo");

        let opts = pipeline_options(&cli.analyze, &config, Some(&project), root);
        assert_eq!(opts.project.as_deref(), Some("from-config"));
        assert_eq!(opts.group.as_deref(), Some("cli-group"));
        assert_eq!(opts.exclude, vec!["a/**".to_string(), "b/**".to_string()]);
        assert_eq!(opts.depfiles, vec![root.join("web/package-lock.json")]);
        assert!(!opts.comment);
        assert!(opts.generate_lockfiles);

        let bare = Cli::parse_from(["phylum-ci"]);
        let opts = pipeline_options(&bare.analyze, &CiConfig::default(), Some(&project), root);
        assert_eq!(opts.project.as_deref(), Some("from-file"));
        assert_eq!(opts.group.as_deref(), Some("file-group"));
    }

    #[test]
    fn positional_files_are_staged_files() {
        let cli = Cli::parse_from(["phylum-ci", "package-lock.json", "poetry.lock"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.analyze.files.len(), 2);
    }
}
