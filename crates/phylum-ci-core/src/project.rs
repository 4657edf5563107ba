use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::PhylumCiError;

/// Name of the project settings file written by `phylum init`.
pub const PROJECT_FILE_NAME: &str = ".phylum_project";

/// Project settings from a `.phylum_project` YAML file.
///
/// # Examples
///
/// ```
/// use phylum_ci_core::ProjectSettings;
///
/// let yaml = "id: 0b7c\nname: web\ngroup: platform\ncreated_at: 2024-01-02T03:04:05Z\n";
/// let settings = ProjectSettings::from_yaml(yaml).unwrap();
/// assert_eq!(settings.name, "web");
/// assert_eq!(settings.group.as_deref(), Some("platform"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSettings {
    /// Project identifier assigned by the service.
    #[serde(default)]
    pub id: Option<String>,
    /// Project name.
    pub name: String,
    /// Group owning the project.
    #[serde(default)]
    pub group: Option<String>,
    /// Creation timestamp, kept verbatim.
    #[serde(default)]
    pub created_at: Option<String>,
}

impl ProjectSettings {
    /// Parse settings from YAML.
    ///
    /// # Errors
    ///
    /// Returns [`PhylumCiError::Yaml`] when the document is malformed or lacks a name.
    pub fn from_yaml(content: &str) -> Result<Self, PhylumCiError> {
        Ok(serde_yaml_ng::from_str(content)?)
    }

    /// Read `.phylum_project` from `dir`, returning `Ok(None)` when absent.
    pub fn load(dir: &Path) -> Result<Option<Self>, PhylumCiError> {
        let path = dir.join(PROJECT_FILE_NAME);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        Self::from_yaml(&content).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_settings_only_need_a_name() {
        let settings = ProjectSettings::from_yaml("name: api\n").unwrap();
        assert_eq!(settings.name, "api");
        assert!(settings.id.is_none());
        assert!(settings.group.is_none());
    }

    #[test]
    fn missing_name_is_an_error() {
        assert!(ProjectSettings::from_yaml("group: platform\n").is_err());
    }

    #[test]
    fn load_absent_file_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ProjectSettings::load(dir.path()).unwrap().is_none());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(PROJECT_FILE_NAME), "name: web\ngroup: g\n").unwrap();
        let settings = ProjectSettings::load(dir.path()).unwrap().unwrap();
        assert_eq!(settings.name, "web");
        assert_eq!(settings.group.as_deref(), Some("g"));
    }
}
