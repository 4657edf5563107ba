//! Known dependency file names and their ecosystems.

use std::fmt;
use std::path::{Path, PathBuf};

use phylum_ci_core::Ecosystem;
use serde::Serialize;

/// Whether a dependency file pins exact versions.
///
/// # Examples
///
/// ```
/// use phylum_ci_depfiles::DepfileKind;
///
/// assert_eq!(DepfileKind::Lockfile.to_string(), "lockfile");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DepfileKind {
    /// Exact resolved versions.
    Lockfile,
    /// Loose version ranges; needs a generated lockfile.
    Manifest,
}

impl fmt::Display for DepfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepfileKind::Lockfile => write!(f, "lockfile"),
            DepfileKind::Manifest => write!(f, "manifest"),
        }
    }
}

/// A dependency file, with its path relative to the repository root.
///
/// # Examples
///
/// ```
/// use phylum_ci_core::Ecosystem;
/// use phylum_ci_depfiles::{Depfile, DepfileKind};
///
/// let depfile = Depfile::classify("web/package-lock.json").unwrap();
/// assert_eq!(depfile.kind, DepfileKind::Lockfile);
/// assert_eq!(depfile.ecosystem, Ecosystem::Npm);
///
/// assert!(Depfile::classify("src/main.rs").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Depfile {
    /// Path relative to the repository root.
    pub path: PathBuf,
    /// Lockfile or manifest.
    pub kind: DepfileKind,
    /// Ecosystem the file belongs to.
    pub ecosystem: Ecosystem,
}

impl Depfile {
    /// Classify a path by its file name.
    pub fn classify(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();
        let file_name = path.file_name()?.to_str()?;
        let (kind, ecosystem) = classify_name(file_name)?;
        Some(Self {
            path: path.to_path_buf(),
            kind,
            ecosystem,
        })
    }

    /// Classify a user-provided path.
    ///
    /// Unrecognized names are treated as lockfiles of unknown ecosystem and
    /// left to the phylum CLI to parse.
    pub fn provided(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        Self::classify(path).unwrap_or_else(|| Self {
            path: path.to_path_buf(),
            kind: DepfileKind::Lockfile,
            ecosystem: Ecosystem::Unknown,
        })
    }

    /// `true` for manifests.
    pub fn is_manifest(&self) -> bool {
        self.kind == DepfileKind::Manifest
    }

    /// Lockfile names that satisfy this manifest, most preferred first.
    ///
    /// Empty for lockfiles.
    pub fn lockfile_names(&self) -> &'static [&'static str] {
        if !self.is_manifest() {
            return &[];
        }
        let file_name = self
            .path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or_default();
        lockfiles_for_manifest(file_name)
    }
}

impl fmt::Display for Depfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} {})",
            self.path.display(),
            self.ecosystem,
            self.kind
        )
    }
}

const LOCKFILES: &[(&str, Ecosystem)] = &[
    ("package-lock.json", Ecosystem::Npm),
    ("npm-shrinkwrap.json", Ecosystem::Npm),
    ("yarn.lock", Ecosystem::Npm),
    ("pnpm-lock.yaml", Ecosystem::Npm),
    ("poetry.lock", Ecosystem::Pypi),
    ("Pipfile.lock", Ecosystem::Pypi),
    ("pdm.lock", Ecosystem::Pypi),
    ("uv.lock", Ecosystem::Pypi),
    ("effective-pom.xml", Ecosystem::Maven),
    ("gradle.lockfile", Ecosystem::Maven),
    ("Gemfile.lock", Ecosystem::Gem),
    ("packages.lock.json", Ecosystem::Nuget),
    ("go.sum", Ecosystem::Golang),
    ("Cargo.lock", Ecosystem::Cargo),
];

const MANIFESTS: &[(&str, Ecosystem)] = &[
    ("package.json", Ecosystem::Npm),
    ("pyproject.toml", Ecosystem::Pypi),
    ("Pipfile", Ecosystem::Pypi),
    ("requirements.in", Ecosystem::Pypi),
    ("pom.xml", Ecosystem::Maven),
    ("build.gradle", Ecosystem::Maven),
    ("build.gradle.kts", Ecosystem::Maven),
    ("Gemfile", Ecosystem::Gem),
    ("go.mod", Ecosystem::Golang),
    ("Cargo.toml", Ecosystem::Cargo),
];

fn classify_name(file_name: &str) -> Option<(DepfileKind, Ecosystem)> {
    if let Some((_, eco)) = LOCKFILES.iter().find(|(name, _)| *name == file_name) {
        return Some((DepfileKind::Lockfile, *eco));
    }
    if let Some((_, eco)) = MANIFESTS.iter().find(|(name, _)| *name == file_name) {
        return Some((DepfileKind::Manifest, *eco));
    }
    // requirements.txt, requirements-dev.txt, requirements_test.txt, ...
    if file_name.starts_with("requirements") && file_name.ends_with(".txt") {
        return Some((DepfileKind::Lockfile, Ecosystem::Pypi));
    }
    if file_name.ends_with(".csproj") {
        return Some((DepfileKind::Manifest, Ecosystem::Nuget));
    }
    None
}

fn lockfiles_for_manifest(file_name: &str) -> &'static [&'static str] {
    match file_name {
        "package.json" => &[
            "package-lock.json",
            "npm-shrinkwrap.json",
            "yarn.lock",
            "pnpm-lock.yaml",
        ],
        "pyproject.toml" => &["poetry.lock", "pdm.lock", "uv.lock"],
        "Pipfile" => &["Pipfile.lock"],
        "requirements.in" => &["requirements.txt"],
        "pom.xml" => &["effective-pom.xml"],
        "build.gradle" | "build.gradle.kts" => &["gradle.lockfile"],
        "Gemfile" => &["Gemfile.lock"],
        "go.mod" => &["go.sum"],
        "Cargo.toml" => &["Cargo.lock"],
        name if name.ends_with(".csproj") => &["packages.lock.json"],
        _ => &[],
    }
}
