//! Lockfile generation for manifests.
//!
//! Each manifest ecosystem has a tool that resolves the manifest into a
//! lockfile. The tool runs in the manifest's directory; the produced
//! lockfile is read back and the directory is restored to how it was found.

use std::path::{Path, PathBuf};
use std::process::Command;

use phylum_ci_core::PhylumCiError;
use tracing::{debug, info, warn};

use crate::catalog::Depfile;

/// External command that turns a manifest into a lockfile.
///
/// # Examples
///
/// ```
/// use phylum_ci_depfiles::{Depfile, GeneratorSpec};
///
/// let manifest = Depfile::classify("web/package.json").unwrap();
/// let spec = GeneratorSpec::for_manifest(&manifest).unwrap();
/// assert_eq!(spec.program, "npm");
/// assert_eq!(spec.lockfile, "package-lock.json");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorSpec {
    /// Executable to run.
    pub program: String,
    /// Arguments passed to `program`.
    pub args: Vec<String>,
    /// Lockfile name the tool writes next to the manifest.
    pub lockfile: String,
}

/// A lockfile produced by a generator.
#[derive(Debug, Clone)]
pub struct GeneratedLockfile {
    /// Where the lockfile was written, relative to the repository root.
    pub path: PathBuf,
    /// Lockfile content.
    pub contents: Vec<u8>,
}

impl GeneratorSpec {
    fn new(program: &str, args: &[&str], lockfile: &str) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            lockfile: lockfile.to_string(),
        }
    }

    /// Generator for a manifest, `None` for lockfiles and unknown names.
    pub fn for_manifest(manifest: &Depfile) -> Option<Self> {
        if !manifest.is_manifest() {
            return None;
        }
        let file_name = manifest.path.file_name()?.to_str()?;
        let spec = match file_name {
            "package.json" => Self::new(
                "npm",
                &["install", "--package-lock-only", "--ignore-scripts"],
                "package-lock.json",
            ),
            "pyproject.toml" => Self::new("poetry", &["lock"], "poetry.lock"),
            "Pipfile" => Self::new("pipenv", &["lock"], "Pipfile.lock"),
            "requirements.in" => Self::new(
                "pip-compile",
                &["--quiet", "--output-file", "requirements.txt", "requirements.in"],
                "requirements.txt",
            ),
            "pom.xml" => Self::new(
                "mvn",
                &["--batch-mode", "help:effective-pom", "-Doutput=effective-pom.xml"],
                "effective-pom.xml",
            ),
            "build.gradle" | "build.gradle.kts" => Self::new(
                "gradle",
                &["dependencies", "--write-locks"],
                "gradle.lockfile",
            ),
            "Gemfile" => Self::new("bundle", &["lock"], "Gemfile.lock"),
            "go.mod" => Self::new("go", &["mod", "tidy"], "go.sum"),
            "Cargo.toml" => Self::new("cargo", &["generate-lockfile"], "Cargo.lock"),
            name if name.ends_with(".csproj") => Self::new(
                "dotnet",
                &["restore", name, "--use-lock-file"],
                "packages.lock.json",
            ),
            _ => return None,
        };
        Some(spec)
    }

    /// Run the generator for `manifest` (relative to `root`).
    ///
    /// The manifest and any pre-existing lockfile are restored afterwards;
    /// a lockfile that did not exist before is removed.
    ///
    /// # Errors
    ///
    /// Returns [`PhylumCiError::Depfile`] when the tool is missing, exits
    /// non-zero, or does not produce the expected lockfile.
    pub fn run(&self, root: &Path, manifest: &Depfile) -> Result<GeneratedLockfile, PhylumCiError> {
        let manifest_path = root.join(&manifest.path);
        let dir = manifest_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| root.to_path_buf());
        let lockfile_path = dir.join(&self.lockfile);

        let _restore = Restore::capture(&[manifest_path.clone(), lockfile_path.clone()])?;

        info!(
            manifest = %manifest.path.display(),
            program = self.program.as_str(),
            "generating lockfile"
        );
        let output = Command::new(&self.program)
            .args(&self.args)
            .current_dir(&dir)
            .output()
            .map_err(|e| {
                PhylumCiError::Depfile(format!(
                    "failed to run '{}' for {}: {e}; is it installed and on PATH?",
                    self.program,
                    manifest.path.display()
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PhylumCiError::Depfile(format!(
                "'{} {}' failed for {}: {}",
                self.program,
                self.args.join(" "),
                manifest.path.display(),
                stderr.trim()
            )));
        }

        let contents = std::fs::read(&lockfile_path).map_err(|e| {
            PhylumCiError::Depfile(format!(
                "'{}' did not produce {}: {e}",
                self.program,
                lockfile_path.display()
            ))
        })?;
        let path = manifest
            .path
            .parent()
            .map(|p| p.join(&self.lockfile))
            .unwrap_or_else(|| PathBuf::from(&self.lockfile));
        debug!(path = %path.display(), bytes = contents.len(), "captured generated lockfile");
        Ok(GeneratedLockfile { path, contents })
    }
}

/// Snapshot of files, written back (or removed) on drop.
struct Restore {
    saved: Vec<(PathBuf, Option<Vec<u8>>)>,
}

impl Restore {
    fn capture(paths: &[PathBuf]) -> Result<Self, PhylumCiError> {
        let mut saved = Vec::with_capacity(paths.len());
        for path in paths {
            let contents = match std::fs::read(path) {
                Ok(bytes) => Some(bytes),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                Err(e) => return Err(PhylumCiError::Io(e)),
            };
            saved.push((path.clone(), contents));
        }
        Ok(Self { saved })
    }
}

impl Drop for Restore {
    fn drop(&mut self) {
        for (path, contents) in &self.saved {
            let result = match contents {
                Some(bytes) => std::fs::write(path, bytes),
                None if path.exists() => std::fs::remove_file(path),
                None => Ok(()),
            };
            if let Err(e) = result {
                warn!(path = %path.display(), error = %e, "failed to restore file after lockfile generation");
            }
        }
    }
}
