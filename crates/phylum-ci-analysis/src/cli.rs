//! Invocation of the external `phylum` CLI.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Output;

use phylum_ci_core::{JobResult, Package, PhylumCiError};
use tokio::process::Command;
use tracing::{debug, info};

/// Options recorded with an analysis job.
#[derive(Debug, Clone, Default)]
pub struct AnalyzeRequest {
    /// Label the job is recorded under.
    pub label: String,
    /// Phylum project.
    pub project: Option<String>,
    /// Phylum group owning the project.
    pub group: Option<String>,
    /// Phylum organization owning the group.
    pub org: Option<String>,
}

/// Handle on a `phylum` executable.
///
/// The API token is passed as `PHYLUM_API_KEY` and a custom API URI as
/// `PHYLUM_API_URI`; neither is placed on the command line.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use phylum_ci_analysis::PhylumCli;
///
/// let cli = PhylumCli::new(PathBuf::from("/usr/local/bin/phylum"))
///     .with_token(Some("ph0_secret".into()));
/// assert!(cli.has_token());
/// ```
#[derive(Debug, Clone)]
pub struct PhylumCli {
    bin: PathBuf,
    token: Option<String>,
    uri: Option<String>,
    workdir: Option<PathBuf>,
}

impl PhylumCli {
    pub fn new(bin: PathBuf) -> Self {
        Self {
            bin,
            token: None,
            uri: None,
            workdir: None,
        }
    }

    /// Set the API token.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Set the API base URI.
    pub fn with_uri(mut self, uri: Option<String>) -> Self {
        self.uri = uri;
        self
    }

    /// Directory commands run in; relative paths resolve against it.
    pub fn with_workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    /// Path of the executable.
    pub fn bin(&self) -> &Path {
        &self.bin
    }

    /// `true` when an API token is configured.
    pub fn has_token(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.trim().is_empty())
    }

    /// Find the executable: an explicit path, then `PATH`, then
    /// `~/.local/bin/phylum`.
    pub fn locate(
        explicit: Option<&Path>,
        path_var: Option<&OsStr>,
        home: Option<&Path>,
    ) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return path.is_file().then(|| path.to_path_buf());
        }
        let exe = format!("phylum{}", std::env::consts::EXE_SUFFIX);
        if let Some(found) = path_var
            .into_iter()
            .flat_map(std::env::split_paths)
            .map(|dir| dir.join(&exe))
            .find(|candidate| candidate.is_file())
        {
            return Some(found);
        }
        home.map(|h| h.join(".local").join("bin").join(&exe))
            .filter(|p| p.is_file())
    }

    /// Output of `phylum --version`, e.g. `phylum v7.1.0`.
    ///
    /// # Errors
    ///
    /// Returns [`PhylumCiError::PhylumCli`] if the executable cannot run.
    pub async fn version(&self) -> Result<String, PhylumCiError> {
        let output = self.run(["--version"]).await?;
        let output = check(output, "phylum --version")?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Create `project`, tolerating one that already exists.
    ///
    /// # Errors
    ///
    /// Returns [`PhylumCiError::PhylumCli`] for any other failure.
    pub async fn ensure_project(
        &self,
        project: &str,
        group: Option<&str>,
        org: Option<&str>,
    ) -> Result<(), PhylumCiError> {
        let mut args: Vec<OsString> = vec!["project".into(), "create".into(), project.into()];
        push_scope(&mut args, group, org);
        let output = self.run(args).await?;
        if output.status.success() {
            info!(project, "created Phylum project");
            return Ok(());
        }
        let combined = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        if combined.to_lowercase().contains("already exists") {
            debug!(project, "Phylum project already exists");
            return Ok(());
        }
        Err(PhylumCiError::PhylumCli(format!(
            "failed to create project '{project}': {}",
            combined.trim()
        )))
    }

    /// Dependencies declared in a dependency file.
    ///
    /// # Errors
    ///
    /// Returns [`PhylumCiError::PhylumCli`] on failure or unparseable output.
    pub async fn parse(&self, depfile: &Path) -> Result<Vec<Package>, PhylumCiError> {
        let args: Vec<OsString> = vec!["parse".into(), depfile.as_os_str().to_owned()];
        let output = self.run(args).await?;
        let output = check(output, &format!("phylum parse {}", depfile.display()))?;
        serde_json::from_slice(&output.stdout).map_err(|e| {
            PhylumCiError::PhylumCli(format!(
                "unexpected output from phylum parse {}: {e}",
                depfile.display()
            ))
        })
    }

    /// Submit dependency files for analysis.
    ///
    /// `phylum analyze` exits non-zero when its own policy fails, so the
    /// job JSON is accepted from stdout whatever the exit status.
    ///
    /// # Errors
    ///
    /// Returns [`PhylumCiError::PhylumCli`] when no job JSON is produced.
    pub async fn analyze(
        &self,
        depfiles: &[PathBuf],
        request: &AnalyzeRequest,
    ) -> Result<JobResult, PhylumCiError> {
        let mut args: Vec<OsString> = vec![
            "analyze".into(),
            "--json".into(),
            "--label".into(),
            request.label.clone().into(),
        ];
        if let Some(project) = &request.project {
            args.push("-p".into());
            args.push(project.into());
        }
        push_scope(&mut args, request.group.as_deref(), request.org.as_deref());
        args.extend(depfiles.iter().map(|p| p.as_os_str().to_owned()));

        info!(label = request.label.as_str(), count = depfiles.len(), "submitting analysis");
        let output = self.run(args).await?;
        job_from_output(output, "phylum analyze")
    }

    /// Current state of a submitted job.
    ///
    /// # Errors
    ///
    /// Returns [`PhylumCiError::PhylumCli`] on failure or unparseable output.
    pub async fn job_status(&self, job_id: &str) -> Result<JobResult, PhylumCiError> {
        let output = self.run(["history", "--json", job_id]).await?;
        let output = check(output, "phylum history")?;
        job_from_output(output, "phylum history")
    }

    async fn run<I, S>(&self, args: I) -> Result<Output, PhylumCiError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(&self.bin);
        command.args(args).kill_on_drop(true);
        if let Some(dir) = &self.workdir {
            command.current_dir(dir);
        }
        if let Some(token) = &self.token {
            command.env("PHYLUM_API_KEY", token);
        }
        if let Some(uri) = &self.uri {
            command.env("PHYLUM_API_URI", uri);
        }
        debug!(bin = %self.bin.display(), "running phylum");
        command.output().await.map_err(|e| {
            PhylumCiError::PhylumCli(format!("failed to run {}: {e}", self.bin.display()))
        })
    }
}

fn push_scope(args: &mut Vec<OsString>, group: Option<&str>, org: Option<&str>) {
    if let Some(group) = group {
        args.push("-g".into());
        args.push(group.into());
    }
    if let Some(org) = org {
        args.push("--org".into());
        args.push(org.into());
    }
}

fn check(output: Output, what: &str) -> Result<Output, PhylumCiError> {
    if output.status.success() {
        return Ok(output);
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(PhylumCiError::PhylumCli(format!(
        "{what} failed ({}): {}",
        output.status,
        stderr.trim()
    )))
}

fn job_from_output(output: Output, what: &str) -> Result<JobResult, PhylumCiError> {
    let parsed = serde_json::from_slice::<JobResult>(&output.stdout);
    match parsed {
        Ok(job) => Ok(job),
        Err(e) if output.status.success() => Err(PhylumCiError::PhylumCli(format!(
            "unexpected output from {what}: {e}"
        ))),
        Err(_) => Err(check(output, what).err().unwrap_or_else(|| {
            PhylumCiError::PhylumCli(format!("{what} produced no job result"))
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locate_prefers_explicit_then_path_then_home() {
        let dir = tempfile::tempdir().unwrap();
        let exe = format!("phylum{}", std::env::consts::EXE_SUFFIX);
        let on_path = dir.path().join("bin");
        let home = dir.path().join("home");
        std::fs::create_dir_all(&on_path).unwrap();
        std::fs::create_dir_all(home.join(".local/bin")).unwrap();
        std::fs::write(on_path.join(&exe), "").unwrap();
        std::fs::write(home.join(".local/bin").join(&exe), "").unwrap();
        let explicit = dir.path().join("custom-phylum");
        std::fs::write(&explicit, "").unwrap();

        let path_var = std::env::join_paths([&on_path]).unwrap();
        assert_eq!(
            PhylumCli::locate(
                Some(explicit.as_path()),
                Some(path_var.as_os_str()),
                Some(home.as_path())
            ),
            Some(explicit.clone())
        );
        assert_eq!(
            PhylumCli::locate(None, Some(path_var.as_os_str()), Some(home.as_path())),
            Some(on_path.join(&exe))
        );
        assert_eq!(
            PhylumCli::locate(None, None, Some(home.as_path())),
            Some(home.join(".local/bin").join(&exe))
        );
        assert_eq!(PhylumCli::locate(None, None, Some(dir.path())), None);
    }

    #[test]
    fn missing_explicit_binary_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            PhylumCli::locate(Some(dir.path().join("nope").as_path()), None, None),
            None
        );
    }

    #[test]
    fn blank_token_does_not_count() {
        let cli = PhylumCli::new(PathBuf::from("phylum")).with_token(Some("  ".into()));
        assert!(!cli.has_token());
    }

    #[tokio::test]
    async fn missing_executable_is_cli_error() {
        let cli = PhylumCli::new(PathBuf::from("/nonexistent/phylum-ci-test/phylum"));
        let err = cli.version().await.unwrap_err();
        assert!(matches!(err, PhylumCiError::PhylumCli(_)));
    }
}
