//! Exclusion of dependency files by glob pattern and vendored location.

use std::path::Path;

use phylum_ci_core::PhylumCiError;

/// Decides which dependency files to leave out of an analysis.
///
/// # Examples
///
/// ```
/// use phylum_ci_depfiles::DepfileFilter;
///
/// let filter = DepfileFilter::new(&["fixtures/**".to_string()]).unwrap();
/// assert!(filter.is_excluded("fixtures/app/package-lock.json"));
/// assert!(filter.is_excluded("node_modules/lodash/package.json"));
/// assert!(!filter.is_excluded("package-lock.json"));
/// ```
pub struct DepfileFilter {
    exclude: Vec<glob::Pattern>,
}

impl DepfileFilter {
    /// Build a filter from glob patterns.
    ///
    /// # Errors
    ///
    /// Returns [`PhylumCiError::Config`] for an invalid pattern.
    pub fn new(patterns: &[String]) -> Result<Self, PhylumCiError> {
        let exclude = patterns
            .iter()
            .map(|pat| {
                glob::Pattern::new(pat).map_err(|e| {
                    PhylumCiError::Config(format!("invalid exclude pattern '{pat}': {e}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { exclude })
    }

    /// A filter that only skips vendored locations.
    pub fn vendored_only() -> Self {
        Self {
            exclude: Vec::new(),
        }
    }

    /// `true` if the repo-relative `path` should be ignored.
    pub fn is_excluded(&self, path: impl AsRef<Path>) -> bool {
        self.excluded_by(path.as_ref()).is_some()
    }

    /// The reason `path` is excluded, if it is.
    pub fn excluded_by(&self, path: &Path) -> Option<String> {
        if is_vendored(&path.to_string_lossy()) {
            return Some("vendored directory".into());
        }
        self.matching_pattern(path)
            .map(|pat| format!("pattern: {pat}"))
    }

    /// The first exclude pattern matching `path` or its file name.
    ///
    /// Vendored locations are not considered, so explicitly provided
    /// depfiles are only dropped by the user's own patterns.
    pub fn matching_pattern(&self, path: &Path) -> Option<&glob::Pattern> {
        let path_str = path.to_string_lossy();
        let file_name = path
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_default();
        self.exclude
            .iter()
            .find(|pat| pat.matches(&path_str) || pat.matches(&file_name))
    }
}

const VENDORED_DIRS: &[&str] = &[
    "node_modules",
    "vendor",
    "third_party",
    "target",
    ".git",
    ".venv",
    "site-packages",
];

fn is_vendored(path: &str) -> bool {
    let mut parts: Vec<&str> = path.split(['/', '\\']).collect();
    // The file name itself never marks a vendored location.
    parts.pop();
    parts.iter().any(|part| VENDORED_DIRS.contains(part))
}
