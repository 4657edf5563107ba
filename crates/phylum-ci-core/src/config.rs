use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::PhylumCiError;
use crate::types::Thresholds;

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".phylum-ci.toml";

/// Top-level configuration loaded from `.phylum-ci.toml`.
///
/// Supports layered resolution: CLI flags > env vars > local config > defaults.
///
/// # Examples
///
/// ```
/// use phylum_ci_core::CiConfig;
///
/// let config = CiConfig::default();
/// assert_eq!(config.analysis.poll_interval_secs, 5);
/// assert!(config.comment.enabled);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CiConfig {
    /// Dependency selection and run-mode settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,
    /// Per-domain risk thresholds.
    #[serde(default)]
    pub thresholds: Thresholds,
    /// External phylum CLI and project settings.
    #[serde(default)]
    pub phylum: PhylumConfig,
    /// Pull request comment settings.
    #[serde(default)]
    pub comment: CommentConfig,
}

impl CiConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`PhylumCiError::Io`] if the file cannot be read, or
    /// [`PhylumCiError::Toml`] if the content is not valid TOML.
    pub fn from_file(path: &Path) -> Result<Self, PhylumCiError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`PhylumCiError::Toml`] if parsing fails, or
    /// [`PhylumCiError::Config`] if a threshold is above 100.
    ///
    /// # Examples
    ///
    /// ```
    /// use phylum_ci_core::CiConfig;
    ///
    /// let toml = r#"
    /// [thresholds]
    /// vulnerability = 60
    /// "#;
    /// let config = CiConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.thresholds.vulnerability, 60);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, PhylumCiError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, otherwise `.phylum-ci.toml` in `dir` when present,
    /// otherwise defaults.
    ///
    /// # Errors
    ///
    /// Returns [`PhylumCiError::FileNotFound`] if an explicit `path` does not exist.
    pub fn load(path: Option<&Path>, dir: &Path) -> Result<Self, PhylumCiError> {
        match path {
            Some(p) if !p.exists() => Err(PhylumCiError::FileNotFound(p.to_path_buf())),
            Some(p) => Self::from_file(p),
            None => {
                let default_path = dir.join(CONFIG_FILE_NAME);
                if default_path.exists() {
                    Self::from_file(&default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn validate(&self) -> Result<(), PhylumCiError> {
        for domain in crate::types::RiskDomain::ALL {
            let value = self.thresholds.get(domain);
            if value > 100 {
                return Err(PhylumCiError::Config(format!(
                    "{domain} threshold must be between 0 and 100, got {value}"
                )));
            }
        }
        if self.analysis.poll_interval_secs == 0 {
            return Err(PhylumCiError::Config(
                "poll_interval_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Dependency selection and run-mode configuration.
///
/// # Examples
///
/// ```
/// use phylum_ci_core::AnalysisConfig;
///
/// let config = AnalysisConfig::default();
/// assert!(config.depfiles.is_empty());
/// assert!(!config.all_deps);
/// assert!(!config.audit);
/// assert!(config.generate_lockfiles);
/// assert_eq!(config.poll_timeout_secs, 600);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Dependency files to analyze; discovered when empty.
    #[serde(default)]
    pub depfiles: Vec<PathBuf>,
    /// Glob patterns of dependency files to ignore.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Evaluate every current dependency instead of only new ones.
    #[serde(default)]
    pub all_deps: bool,
    /// Report results without failing the run.
    #[serde(default)]
    pub audit: bool,
    /// Analyze even when no dependency file changed.
    #[serde(default)]
    pub force_analysis: bool,
    /// Generate lockfiles for manifests that lack one.
    #[serde(default = "default_generate_lockfiles")]
    pub generate_lockfiles: bool,
    /// Seconds between job status queries (default: 5).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Give up waiting for processing packages after this many seconds (default: 600).
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
}

fn default_generate_lockfiles() -> bool {
    true
}

fn default_poll_interval() -> u64 {
    5
}

fn default_poll_timeout() -> u64 {
    600
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            depfiles: Vec::new(),
            exclude: Vec::new(),
            all_deps: false,
            audit: false,
            force_analysis: false,
            generate_lockfiles: default_generate_lockfiles(),
            poll_interval_secs: default_poll_interval(),
            poll_timeout_secs: default_poll_timeout(),
        }
    }
}

/// External phylum CLI and project configuration.
///
/// # Examples
///
/// ```
/// use phylum_ci_core::PhylumConfig;
///
/// let config = PhylumConfig::default();
/// assert_eq!(config.release, "latest");
/// assert!(config.project.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhylumConfig {
    /// CLI release to install, e.g. `"v5.9.0"` or `"latest"`.
    #[serde(default = "default_release")]
    pub release: String,
    /// Custom API URI passed to the CLI.
    pub uri: Option<String>,
    /// Project name; falls back to `.phylum_project`, then the repository name.
    pub project: Option<String>,
    /// Group owning the project.
    pub group: Option<String>,
    /// Organization owning the group.
    pub org: Option<String>,
    /// Explicit path to the phylum binary.
    pub bin: Option<PathBuf>,
}

fn default_release() -> String {
    "latest".into()
}

impl Default for PhylumConfig {
    fn default() -> Self {
        Self {
            release: default_release(),
            uri: None,
            project: None,
            group: None,
            org: None,
            bin: None,
        }
    }
}

/// Pull request comment configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentConfig {
    /// Post results as a comment in pull request contexts (default: true).
    #[serde(default = "default_comment_enabled")]
    pub enabled: bool,
}

fn default_comment_enabled() -> bool {
    true
}

impl Default for CommentConfig {
    fn default() -> Self {
        Self {
            enabled: default_comment_enabled(),
        }
    }
}
