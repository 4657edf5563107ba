use std::path::PathBuf;

use crate::types::ReturnCode;

/// Errors that can occur anywhere in phylum-ci.
///
/// Each variant wraps a specific failure domain. Library crates use this type
/// directly; the binary converts to `miette::Report` at the boundary and uses
/// [`PhylumCiError::return_code`] to choose the process exit code.
///
/// # Examples
///
/// ```
/// use phylum_ci_core::{PhylumCiError, ReturnCode};
///
/// let err = PhylumCiError::Config("bad threshold".into());
/// assert!(err.to_string().contains("bad threshold"));
/// assert_eq!(err.return_code(), ReturnCode::Unexpected);
/// ```
#[derive(Debug, thiserror::Error)]
pub enum PhylumCiError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Git repository or ref resolution failure.
    #[error("git error: {0}")]
    Git(String),

    /// A dependency file could not be classified, generated, or read.
    #[error("dependency file error: {0}")]
    Depfile(String),

    /// The external `phylum` CLI failed or produced unusable output.
    #[error("phylum CLI error: {0}")]
    PhylumCli(String),

    /// A CI provider API call failed.
    #[error("{platform} API error: {message}")]
    Platform {
        /// CI platform name.
        platform: String,
        /// Failure description.
        message: String,
    },

    /// No Phylum API token was provided.
    #[error("no Phylum API token found")]
    MissingPhylumToken,

    /// Posting a comment requires a CI token that was not provided.
    #[error("{platform} requires the {env_var} environment variable to post comments")]
    MissingCiToken {
        /// CI platform name.
        platform: String,
        /// Environment variable expected to hold the token.
        env_var: String,
    },

    /// No dependency files were provided or discovered.
    #[error("no dependency files found")]
    NoDepfiles,

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// YAML deserialization failure.
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),
}

impl PhylumCiError {
    /// Map this error to the process exit code that reports it.
    ///
    /// # Examples
    ///
    /// ```
    /// use phylum_ci_core::{PhylumCiError, ReturnCode};
    ///
    /// assert_eq!(PhylumCiError::NoDepfiles.return_code(), ReturnCode::NoDepfiles);
    /// assert_eq!(
    ///     PhylumCiError::MissingPhylumToken.return_code(),
    ///     ReturnCode::MissingPhylumToken
    /// );
    /// ```
    pub fn return_code(&self) -> ReturnCode {
        match self {
            PhylumCiError::MissingPhylumToken => ReturnCode::MissingPhylumToken,
            PhylumCiError::MissingCiToken { .. } => ReturnCode::MissingCiToken,
            PhylumCiError::NoDepfiles => ReturnCode::NoDepfiles,
            PhylumCiError::Git(_) => ReturnCode::GitFailure,
            PhylumCiError::PhylumCli(_) => ReturnCode::PhylumCliFailure,
            PhylumCiError::Platform { .. } => ReturnCode::PlatformFailure,
            _ => ReturnCode::Unexpected,
        }
    }

    /// Shorthand for a [`PhylumCiError::Platform`] error.
    pub fn platform(platform: impl Into<String>, message: impl Into<String>) -> Self {
        PhylumCiError::Platform {
            platform: platform.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: PhylumCiError = io_err.into();
        assert!(err.to_string().contains("gone"));
        assert_eq!(err.return_code(), ReturnCode::Unexpected);
    }

    #[test]
    fn missing_ci_token_names_env_var() {
        let err = PhylumCiError::MissingCiToken {
            platform: "GitLab CI".into(),
            env_var: "GITLAB_TOKEN".into(),
        };
        assert_eq!(
            err.to_string(),
            "GitLab CI requires the GITLAB_TOKEN environment variable to post comments"
        );
        assert_eq!(err.return_code(), ReturnCode::MissingCiToken);
    }

    #[test]
    fn platform_error_displays_platform() {
        let err = PhylumCiError::platform("Bitbucket Pipelines", "401 Unauthorized");
        assert_eq!(
            err.to_string(),
            "Bitbucket Pipelines API error: 401 Unauthorized"
        );
        assert_eq!(err.return_code(), ReturnCode::PlatformFailure);
    }

    #[test]
    fn file_not_found_shows_path() {
        let err = PhylumCiError::FileNotFound(PathBuf::from("/tmp/package-lock.json"));
        assert!(err.to_string().contains("/tmp/package-lock.json"));
    }

    #[test]
    fn git_and_cli_errors_have_dedicated_codes() {
        assert_eq!(
            PhylumCiError::Git("bad ref".into()).return_code(),
            ReturnCode::GitFailure
        );
        assert_eq!(
            PhylumCiError::PhylumCli("exit 1".into()).return_code(),
            ReturnCode::PhylumCliFailure
        );
    }
}
