use std::collections::HashMap;

/// Snapshot of environment variables used for platform detection.
///
/// Detection reads from this snapshot instead of the process environment so
/// that every provider can be exercised from tests.
///
/// # Examples
///
/// ```
/// use phylum_ci_platforms::EnvVars;
///
/// let env = EnvVars::from_pairs([("GITLAB_CI", "true"), ("EMPTY", "")]);
/// assert!(env.is("GITLAB_CI", "true"));
/// assert_eq!(env.get("EMPTY"), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct EnvVars {
    vars: HashMap<String, String>,
}

impl EnvVars {
    /// Capture the current process environment.
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Build a snapshot from key/value pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Value of `key`; empty values count as unset.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// `true` if `key` is set to exactly `value`.
    pub fn is(&self, key: &str, value: &str) -> bool {
        self.get(key) == Some(value)
    }

    /// `true` if `key` is set to a non-empty value.
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Value of `key`, owned.
    pub fn owned(&self, key: &str) -> Option<String> {
        self.get(key).map(str::to_string)
    }

    /// Set a value, returning the updated snapshot.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }
}
