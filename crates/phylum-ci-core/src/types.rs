use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Package ecosystem, as reported by the `type` field of the phylum CLI.
///
/// # Examples
///
/// ```
/// use phylum_ci_core::Ecosystem;
///
/// let eco: Ecosystem = serde_json::from_str("\"npm\"").unwrap();
/// assert_eq!(eco, Ecosystem::Npm);
///
/// let other: Ecosystem = serde_json::from_str("\"hex\"").unwrap();
/// assert_eq!(other, Ecosystem::Unknown);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    Npm,
    Pypi,
    Maven,
    #[serde(alias = "rubygems")]
    Gem,
    Nuget,
    #[serde(alias = "go")]
    Golang,
    Cargo,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Ecosystem::Npm => "npm",
            Ecosystem::Pypi => "pypi",
            Ecosystem::Maven => "maven",
            Ecosystem::Gem => "gem",
            Ecosystem::Nuget => "nuget",
            Ecosystem::Golang => "golang",
            Ecosystem::Cargo => "cargo",
            Ecosystem::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Whether a dependency is introduced by the change or was already present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageOrigin {
    /// Present in the current dependency set but not in the base set.
    New,
    /// Present in both the current and the base dependency sets.
    #[default]
    Existing,
}

impl fmt::Display for PackageOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageOrigin::New => write!(f, "new"),
            PackageOrigin::Existing => write!(f, "existing"),
        }
    }
}

/// Identity of a package for set arithmetic: ecosystem, name, and version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PackageId {
    pub ecosystem: Ecosystem,
    pub name: String,
    pub version: String,
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}", self.ecosystem, self.name, self.version)
    }
}

/// A single dependency record.
///
/// `origin` and `depfile` are bookkeeping and do not take part in identity;
/// use [`Package::id`] to compare packages across dependency sets.
///
/// # Examples
///
/// ```
/// use phylum_ci_core::{Ecosystem, Package, PackageOrigin};
///
/// let pkg: Package = serde_json::from_str(
///     r#"{"name": "left-pad", "version": "1.3.0", "type": "npm"}"#,
/// ).unwrap();
/// assert_eq!(pkg.ecosystem, Ecosystem::Npm);
/// assert_eq!(pkg.origin, PackageOrigin::Existing);
/// assert_eq!(pkg.id().to_string(), "npm:left-pad@1.3.0");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    /// Package name.
    pub name: String,
    /// Resolved version.
    pub version: String,
    /// Package ecosystem.
    #[serde(rename = "type", alias = "ecosystem")]
    pub ecosystem: Ecosystem,
    /// New or pre-existing relative to the base ref.
    #[serde(default)]
    pub origin: PackageOrigin,
    /// Dependency file the package was parsed from.
    #[serde(default, alias = "lockfile", skip_serializing_if = "Option::is_none")]
    pub depfile: Option<PathBuf>,
}

impl Package {
    /// Create an existing package with no depfile attribution.
    pub fn new(name: impl Into<String>, version: impl Into<String>, ecosystem: Ecosystem) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ecosystem,
            origin: PackageOrigin::Existing,
            depfile: None,
        }
    }

    /// Identity used for set difference and result lookup.
    pub fn id(&self) -> PackageId {
        PackageId {
            ecosystem: self.ecosystem,
            name: self.name.clone(),
            version: self.version.clone(),
        }
    }
}

/// One of the five fixed risk domains scored by the analysis service.
///
/// # Examples
///
/// ```
/// use phylum_ci_core::RiskDomain;
///
/// assert_eq!(RiskDomain::ALL.len(), 5);
/// assert_eq!(RiskDomain::MaliciousCode.to_string(), "Malicious Code");
/// assert_eq!("mal".parse::<RiskDomain>().unwrap(), RiskDomain::MaliciousCode);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskDomain {
    Vulnerability,
    #[serde(alias = "malicious")]
    MaliciousCode,
    Engineering,
    License,
    Author,
}

impl RiskDomain {
    /// All domains in reporting order.
    pub const ALL: [RiskDomain; 5] = [
        RiskDomain::Vulnerability,
        RiskDomain::MaliciousCode,
        RiskDomain::Engineering,
        RiskDomain::License,
        RiskDomain::Author,
    ];

    /// Short label used in CLI flags and compact tables.
    pub fn short(self) -> &'static str {
        match self {
            RiskDomain::Vulnerability => "vul",
            RiskDomain::MaliciousCode => "mal",
            RiskDomain::Engineering => "eng",
            RiskDomain::License => "lic",
            RiskDomain::Author => "aut",
        }
    }
}

impl fmt::Display for RiskDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RiskDomain::Vulnerability => "Vulnerability",
            RiskDomain::MaliciousCode => "Malicious Code",
            RiskDomain::Engineering => "Engineering",
            RiskDomain::License => "License",
            RiskDomain::Author => "Author",
        };
        f.write_str(name)
    }
}

impl FromStr for RiskDomain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', ' '], "_").as_str() {
            "vul" | "vulnerability" => Ok(RiskDomain::Vulnerability),
            "mal" | "malicious" | "malicious_code" => Ok(RiskDomain::MaliciousCode),
            "eng" | "engineering" => Ok(RiskDomain::Engineering),
            "lic" | "license" => Ok(RiskDomain::License),
            "aut" | "author" => Ok(RiskDomain::Author),
            other => Err(format!("unknown risk domain: {other}")),
        }
    }
}

/// Per-domain risk scores in `[0.0, 1.0]`, lower is riskier.
///
/// Scores are optional because packages still being processed have none.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskScores {
    #[serde(default)]
    pub total: Option<f64>,
    #[serde(default)]
    pub vulnerability: Option<f64>,
    #[serde(default, alias = "malicious")]
    pub malicious_code: Option<f64>,
    #[serde(default)]
    pub engineering: Option<f64>,
    #[serde(default)]
    pub license: Option<f64>,
    #[serde(default)]
    pub author: Option<f64>,
}

impl RiskScores {
    /// Score for a single domain.
    pub fn get(&self, domain: RiskDomain) -> Option<f64> {
        match domain {
            RiskDomain::Vulnerability => self.vulnerability,
            RiskDomain::MaliciousCode => self.malicious_code,
            RiskDomain::Engineering => self.engineering,
            RiskDomain::License => self.license,
            RiskDomain::Author => self.author,
        }
    }
}

/// Minimum acceptable score per domain, as an integer percentage.
///
/// A threshold of `0` disables the domain. A completed package violates a
/// domain when `score * 100 < threshold`.
///
/// # Examples
///
/// ```
/// use phylum_ci_core::{RiskDomain, RiskScores, Thresholds};
///
/// let thresholds = Thresholds { vulnerability: 60, ..Thresholds::default() };
/// let scores = RiskScores { vulnerability: Some(0.45), author: Some(0.1), ..RiskScores::default() };
/// assert_eq!(thresholds.violations(&scores), vec![(RiskDomain::Vulnerability, 0.45)]);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde(default)]
    pub vulnerability: u8,
    #[serde(default, alias = "malicious")]
    pub malicious_code: u8,
    #[serde(default)]
    pub engineering: u8,
    #[serde(default)]
    pub license: u8,
    #[serde(default)]
    pub author: u8,
}

impl Thresholds {
    /// Threshold for a single domain.
    pub fn get(&self, domain: RiskDomain) -> u8 {
        match domain {
            RiskDomain::Vulnerability => self.vulnerability,
            RiskDomain::MaliciousCode => self.malicious_code,
            RiskDomain::Engineering => self.engineering,
            RiskDomain::License => self.license,
            RiskDomain::Author => self.author,
        }
    }

    /// Set the threshold for a single domain.
    pub fn set(&mut self, domain: RiskDomain, value: u8) {
        let slot = match domain {
            RiskDomain::Vulnerability => &mut self.vulnerability,
            RiskDomain::MaliciousCode => &mut self.malicious_code,
            RiskDomain::Engineering => &mut self.engineering,
            RiskDomain::License => &mut self.license,
            RiskDomain::Author => &mut self.author,
        };
        *slot = value;
    }

    /// `true` when at least one domain is enforced.
    pub fn any_enabled(&self) -> bool {
        RiskDomain::ALL.iter().any(|d| self.get(*d) > 0)
    }

    /// Domains whose score falls below the configured threshold.
    ///
    /// Domains without a score are never reported as violations.
    pub fn violations(&self, scores: &RiskScores) -> Vec<(RiskDomain, f64)> {
        RiskDomain::ALL
            .iter()
            .filter_map(|&domain| {
                let threshold = self.get(domain);
                if threshold == 0 {
                    return None;
                }
                let score = scores.get(domain)?;
                // Compare whole percentages; 0.57 * 100.0 is 56.999...
                let percent = (score * 100.0).round();
                (percent < f64::from(threshold)).then_some((domain, score))
            })
            .collect()
    }
}

/// An issue reported for a package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Short description.
    pub title: String,
    /// Severity label as reported by the service (`low` … `critical`).
    #[serde(default)]
    pub severity: String,
    /// Domain the issue belongs to.
    #[serde(default)]
    pub domain: Option<RiskDomain>,
}

/// Processing state of a single package.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageStatus {
    Complete,
    #[default]
    #[serde(alias = "processing", alias = "pending")]
    Incomplete,
}

/// Processing state of an analysis job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Complete,
    #[default]
    #[serde(alias = "processing", alias = "pending")]
    Incomplete,
}

/// Analysis result for one package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageResult {
    pub name: String,
    pub version: String,
    #[serde(rename = "type", alias = "ecosystem")]
    pub ecosystem: Ecosystem,
    #[serde(default)]
    pub status: PackageStatus,
    #[serde(default, alias = "riskScores")]
    pub risk_scores: RiskScores,
    #[serde(default)]
    pub issues: Vec<Issue>,
}

impl PackageResult {
    /// Identity matching [`Package::id`].
    pub fn id(&self) -> PackageId {
        PackageId {
            ecosystem: self.ecosystem,
            name: self.name.clone(),
            version: self.version.clone(),
        }
    }

    /// `true` once the service has finished scoring this package.
    pub fn is_complete(&self) -> bool {
        self.status == PackageStatus::Complete
    }
}

/// An analysis job as returned by `phylum analyze --json` and `phylum history --json`.
///
/// # Examples
///
/// ```
/// use phylum_ci_core::{JobResult, JobStatus};
///
/// let job: JobResult = serde_json::from_str(r#"{
///     "job_id": "5b3c",
///     "status": "complete",
///     "packages": [{
///         "name": "left-pad", "version": "1.3.0", "type": "npm",
///         "status": "complete",
///         "risk_scores": {"vulnerability": 1.0, "malicious_code": 1.0,
///                         "engineering": 0.8, "license": 1.0, "author": 0.9}
///     }]
/// }"#).unwrap();
/// assert_eq!(job.status, JobStatus::Complete);
/// assert_eq!(job.packages.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    #[serde(alias = "jobId")]
    pub job_id: String,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default, alias = "dependencies")]
    pub packages: Vec<PackageResult>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

impl JobResult {
    /// `true` when the job or any of its packages is still processing.
    pub fn is_pending(&self) -> bool {
        self.status == JobStatus::Incomplete || self.packages.iter().any(|p| !p.is_complete())
    }
}

/// Overall policy outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Every evaluated package completed without a violation.
    Passed,
    /// At least one completed package violated a threshold.
    Failed,
    /// No violations so far, but some packages are still processing.
    Incomplete,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Passed => write!(f, "SUCCESS"),
            Verdict::Failed => write!(f, "FAILED"),
            Verdict::Incomplete => write!(f, "INCOMPLETE"),
        }
    }
}

/// Process exit codes.
///
/// These let CI systems distinguish a policy failure from a setup problem.
///
/// # Examples
///
/// ```
/// use phylum_ci_core::ReturnCode;
///
/// assert_eq!(ReturnCode::Success.code(), 0);
/// assert_eq!(ReturnCode::PolicyFailure.code(), 1);
/// assert_eq!(ReturnCode::NoDepfiles.to_string(), "no dependency files (12)");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ReturnCode {
    /// Analysis passed, there was nothing to analyze, or audit mode was on.
    Success = 0,
    /// A completed dependency violated a threshold.
    PolicyFailure = 1,
    /// Invalid command-line arguments.
    UsageError = 2,
    /// No Phylum API token.
    MissingPhylumToken = 10,
    /// A CI token was required for posting comments but missing.
    MissingCiToken = 11,
    /// No dependency files found or provided.
    NoDepfiles = 12,
    /// Git repository or ref resolution failed.
    GitFailure = 13,
    /// The external phylum CLI failed.
    PhylumCliFailure = 14,
    /// A CI provider API call failed.
    PlatformFailure = 15,
    /// Any other error.
    Unexpected = 20,
}

impl ReturnCode {
    /// All codes, in documentation order.
    pub const ALL: [ReturnCode; 10] = [
        ReturnCode::Success,
        ReturnCode::PolicyFailure,
        ReturnCode::UsageError,
        ReturnCode::MissingPhylumToken,
        ReturnCode::MissingCiToken,
        ReturnCode::NoDepfiles,
        ReturnCode::GitFailure,
        ReturnCode::PhylumCliFailure,
        ReturnCode::PlatformFailure,
        ReturnCode::Unexpected,
    ];

    /// Numeric exit code.
    pub fn code(self) -> i32 {
        self as i32
    }

    fn description(self) -> &'static str {
        match self {
            ReturnCode::Success => "success",
            ReturnCode::PolicyFailure => "policy failure",
            ReturnCode::UsageError => "usage error",
            ReturnCode::MissingPhylumToken => "missing Phylum token",
            ReturnCode::MissingCiToken => "missing CI token",
            ReturnCode::NoDepfiles => "no dependency files",
            ReturnCode::GitFailure => "git failure",
            ReturnCode::PhylumCliFailure => "phylum CLI failure",
            ReturnCode::PlatformFailure => "CI platform failure",
            ReturnCode::Unexpected => "unexpected error",
        }
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.code())
    }
}

/// Output format for the local report.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument parsing.
///
/// # Examples
///
/// ```
/// use phylum_ci_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable tables and summaries.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
    /// Markdown, identical to the posted comment.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_format_from_str() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!(
            "markdown".parse::<OutputFormat>().unwrap(),
            OutputFormat::Markdown
        );
        assert!("sarif".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn package_identity_ignores_origin_and_depfile() {
        let mut a = Package::new("requests", "2.31.0", Ecosystem::Pypi);
        let mut b = a.clone();
        a.origin = PackageOrigin::New;
        b.depfile = Some(PathBuf::from("poetry.lock"));
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn package_serializes_type_field() {
        let pkg = Package::new("serde", "1.0.200", Ecosystem::Cargo);
        let json = serde_json::to_value(&pkg).unwrap();
        assert_eq!(json["type"], "cargo");
        assert!(json.get("depfile").is_none());
    }

    #[test]
    fn threshold_zero_disables_domain() {
        let thresholds = Thresholds::default();
        let scores = RiskScores {
            vulnerability: Some(0.0),
            malicious_code: Some(0.0),
            ..RiskScores::default()
        };
        assert!(!thresholds.any_enabled());
        assert!(thresholds.violations(&scores).is_empty());
    }

    #[test]
    fn threshold_boundary_is_not_a_violation() {
        let thresholds = Thresholds {
            license: 70,
            ..Thresholds::default()
        };
        let at = RiskScores {
            license: Some(0.70),
            ..RiskScores::default()
        };
        let below = RiskScores {
            license: Some(0.69),
            ..RiskScores::default()
        };
        assert!(thresholds.violations(&at).is_empty());
        assert_eq!(
            thresholds.violations(&below),
            vec![(RiskDomain::License, 0.69)]
        );
    }

    #[test]
    fn score_equal_to_threshold_passes_at_every_percentage() {
        for pct in 1..=100u8 {
            let thresholds = Thresholds {
                malicious_code: pct,
                ..Thresholds::default()
            };
            let at = RiskScores {
                malicious_code: Some(f64::from(pct) / 100.0),
                ..RiskScores::default()
            };
            assert!(thresholds.violations(&at).is_empty(), "{pct} at threshold");

            let below = RiskScores {
                malicious_code: Some(f64::from(pct - 1) / 100.0),
                ..RiskScores::default()
            };
            assert_eq!(thresholds.violations(&below).len(), 1, "{pct} below threshold");
        }
    }

    #[test]
    fn missing_scores_never_violate() {
        let thresholds = Thresholds {
            author: 90,
            ..Thresholds::default()
        };
        assert!(thresholds.violations(&RiskScores::default()).is_empty());
    }

    #[test]
    fn thresholds_set_and_get() {
        let mut thresholds = Thresholds::default();
        for (i, domain) in RiskDomain::ALL.iter().enumerate() {
            thresholds.set(*domain, (i as u8 + 1) * 10);
        }
        assert_eq!(thresholds.vulnerability, 10);
        assert_eq!(thresholds.author, 50);
        assert_eq!(thresholds.get(RiskDomain::License), 40);
    }

    #[test]
    fn job_pending_when_any_package_incomplete() {
        let job: JobResult = serde_json::from_str(
            r#"{
                "job_id": "abc",
                "status": "complete",
                "packages": [
                    {"name": "a", "version": "1", "type": "npm", "status": "complete"},
                    {"name": "b", "version": "2", "type": "npm", "status": "processing"}
                ]
            }"#,
        )
        .unwrap();
        assert!(job.is_pending());
        assert_eq!(job.packages[1].status, PackageStatus::Incomplete);
    }

    #[test]
    fn job_accepts_camel_case_aliases() {
        let job: JobResult = serde_json::from_str(
            r#"{
                "jobId": "abc",
                "status": "complete",
                "dependencies": [{
                    "name": "a", "version": "1", "ecosystem": "pypi", "status": "complete",
                    "riskScores": {"malicious": 0.2}
                }]
            }"#,
        )
        .unwrap();
        assert_eq!(job.job_id, "abc");
        assert_eq!(job.packages[0].ecosystem, Ecosystem::Pypi);
        assert_eq!(job.packages[0].risk_scores.malicious_code, Some(0.2));
        assert!(!job.is_pending());
    }

    #[test]
    fn return_codes_are_distinct() {
        let mut codes: Vec<i32> = ReturnCode::ALL.iter().map(|c| c.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), ReturnCode::ALL.len());
    }

    #[test]
    fn risk_domain_parses_long_and_short_names() {
        assert_eq!(
            "Malicious Code".parse::<RiskDomain>().unwrap(),
            RiskDomain::MaliciousCode
        );
        assert_eq!("lic".parse::<RiskDomain>().unwrap(), RiskDomain::License);
        assert!("popularity".parse::<RiskDomain>().is_err());
    }

    #[test]
    fn verdict_display() {
        assert_eq!(Verdict::Passed.to_string(), "SUCCESS");
        assert_eq!(Verdict::Failed.to_string(), "FAILED");
        assert_eq!(Verdict::Incomplete.to_string(), "INCOMPLETE");
    }
}
