//! Threshold evaluation of analysis results.

use std::collections::HashMap;

use phylum_ci_core::{
    Issue, JobResult, Package, PackageId, PackageOrigin, PackageResult, ReturnCode, RiskDomain,
    RiskScores, Thresholds, Verdict,
};
use serde::Serialize;

/// A domain score under its threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    pub domain: RiskDomain,
    /// Score in `[0.0, 1.0]`.
    pub score: f64,
    /// Threshold percentage the score fell below.
    pub threshold: u8,
}

/// Evaluation of one completed package.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageEvaluation {
    pub package: PackageId,
    pub origin: PackageOrigin,
    pub scores: RiskScores,
    pub violations: Vec<Violation>,
    pub issues: Vec<Issue>,
}

impl PackageEvaluation {
    /// `true` when at least one domain is under its threshold.
    pub fn failed(&self) -> bool {
        !self.violations.is_empty()
    }
}

/// Outcome of evaluating an analysis job against thresholds.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyReport {
    pub verdict: Verdict,
    pub thresholds: Thresholds,
    /// Completed packages, failures first.
    pub packages: Vec<PackageEvaluation>,
    /// Packages still processing when results were collected.
    pub pending: Vec<PackageId>,
    /// Whether existing dependencies were evaluated too.
    pub all_deps: bool,
    pub job_id: String,
    pub label: Option<String>,
}

impl PolicyReport {
    /// Completed packages that violate a threshold.
    pub fn failures(&self) -> impl Iterator<Item = &PackageEvaluation> {
        self.packages.iter().filter(|p| p.failed())
    }

    /// Exit code for this report; audit mode never fails.
    pub fn return_code(&self, audit: bool) -> ReturnCode {
        if self.verdict == Verdict::Failed && !audit {
            ReturnCode::PolicyFailure
        } else {
            ReturnCode::Success
        }
    }
}

/// Evaluate the `evaluated` packages against `thresholds` using `job`.
///
/// Packages missing from the job or still processing are pending; they never
/// fail the run.
///
/// # Examples
///
/// ```
/// use phylum_ci_core::{Ecosystem, JobResult, Package, Thresholds, Verdict};
/// use phylum_ci_analysis::policy::evaluate;
///
/// let job: JobResult = serde_json::from_str(r#"{
///     "job_id": "j1", "status": "complete",
///     "packages": [{"name": "evil", "version": "0.0.1", "type": "npm",
///                   "status": "complete",
///                   "risk_scores": {"malicious_code": 0.1}}]
/// }"#).unwrap();
/// let thresholds = Thresholds { malicious_code: 80, ..Thresholds::default() };
/// let pkgs = vec![Package::new("evil", "0.0.1", Ecosystem::Npm)];
///
/// let report = evaluate(&job, &pkgs, &thresholds, false);
/// assert_eq!(report.verdict, Verdict::Failed);
/// ```
pub fn evaluate(
    job: &JobResult,
    evaluated: &[Package],
    thresholds: &Thresholds,
    all_deps: bool,
) -> PolicyReport {
    let results: HashMap<PackageId, &PackageResult> =
        job.packages.iter().map(|r| (r.id(), r)).collect();

    let mut packages = Vec::new();
    let mut pending = Vec::new();
    for pkg in evaluated {
        let id = pkg.id();
        match results.get(&id) {
            Some(result) if result.is_complete() => {
                let violations = thresholds
                    .violations(&result.risk_scores)
                    .into_iter()
                    .map(|(domain, score)| Violation {
                        domain,
                        score,
                        threshold: thresholds.get(domain),
                    })
                    .collect();
                packages.push(PackageEvaluation {
                    package: id,
                    origin: pkg.origin,
                    scores: result.risk_scores.clone(),
                    violations,
                    issues: result.issues.clone(),
                });
            }
            _ => pending.push(id),
        }
    }
    packages.sort_by(|a, b| b.failed().cmp(&a.failed()).then_with(|| a.package.cmp(&b.package)));
    pending.sort();
    pending.dedup();

    let verdict = if packages.iter().any(PackageEvaluation::failed) {
        Verdict::Failed
    } else if !pending.is_empty() {
        Verdict::Incomplete
    } else {
        Verdict::Passed
    };

    PolicyReport {
        verdict,
        thresholds: *thresholds,
        packages,
        pending,
        all_deps,
        job_id: job.job_id.clone(),
        label: job.label.clone(),
    }
}

#[cfg(test)]
mod tests {
    use phylum_ci_core::{Ecosystem, JobStatus, PackageStatus};

    use super::*;

    fn result(name: &str, status: PackageStatus, vuln: f64) -> PackageResult {
        PackageResult {
            name: name.into(),
            version: "1.0.0".into(),
            ecosystem: Ecosystem::Npm,
            status,
            risk_scores: RiskScores {
                vulnerability: Some(vuln),
                ..RiskScores::default()
            },
            issues: vec![],
        }
    }

    fn job(packages: Vec<PackageResult>) -> JobResult {
        JobResult {
            job_id: "job".into(),
            status: JobStatus::Complete,
            packages,
            project: None,
            label: Some("label".into()),
        }
    }

    fn new_pkg(name: &str) -> Package {
        let mut pkg = Package::new(name, "1.0.0", Ecosystem::Npm);
        pkg.origin = PackageOrigin::New;
        pkg
    }

    fn thresholds(vuln: u8) -> Thresholds {
        Thresholds {
            vulnerability: vuln,
            ..Thresholds::default()
        }
    }

    #[test]
    fn all_complete_and_above_threshold_passes() {
        let job = job(vec![result("a", PackageStatus::Complete, 0.9)]);
        let report = evaluate(&job, &[new_pkg("a")], &thresholds(50), false);
        assert_eq!(report.verdict, Verdict::Passed);
        assert_eq!(report.return_code(false), ReturnCode::Success);
    }

    #[test]
    fn score_equal_to_threshold_passes() {
        let job = job(vec![result("a", PackageStatus::Complete, 0.5)]);
        let report = evaluate(&job, &[new_pkg("a")], &thresholds(50), false);
        assert_eq!(report.verdict, Verdict::Passed);
    }

    #[test]
    fn violation_fails_unless_audit() {
        let job = job(vec![
            result("ok", PackageStatus::Complete, 0.9),
            result("bad", PackageStatus::Complete, 0.2),
        ]);
        let report = evaluate(&job, &[new_pkg("ok"), new_pkg("bad")], &thresholds(60), false);
        assert_eq!(report.verdict, Verdict::Failed);
        assert_eq!(report.packages[0].package.name, "bad");
        assert_eq!(
            report.packages[0].violations,
            vec![Violation {
                domain: RiskDomain::Vulnerability,
                score: 0.2,
                threshold: 60
            }]
        );
        assert_eq!(report.failures().count(), 1);
        assert_eq!(report.return_code(false), ReturnCode::PolicyFailure);
        assert_eq!(report.return_code(true), ReturnCode::Success);
    }

    #[test]
    fn disabled_domain_never_fails() {
        let job = job(vec![result("bad", PackageStatus::Complete, 0.0)]);
        let report = evaluate(&job, &[new_pkg("bad")], &thresholds(0), false);
        assert_eq!(report.verdict, Verdict::Passed);
    }

    #[test]
    fn processing_packages_are_pending_not_failures() {
        let job = job(vec![result("slow", PackageStatus::Incomplete, 0.0)]);
        let report = evaluate(&job, &[new_pkg("slow"), new_pkg("unknown")], &thresholds(90), false);
        assert_eq!(report.verdict, Verdict::Incomplete);
        assert_eq!(report.pending.len(), 2);
        assert!(report.packages.is_empty());
        assert_eq!(report.return_code(false), ReturnCode::Success);
    }

    #[test]
    fn failure_wins_over_pending() {
        let job = job(vec![
            result("bad", PackageStatus::Complete, 0.1),
            result("slow", PackageStatus::Incomplete, 0.0),
        ]);
        let report = evaluate(&job, &[new_pkg("bad"), new_pkg("slow")], &thresholds(50), false);
        assert_eq!(report.verdict, Verdict::Failed);
    }

    #[test]
    fn only_evaluated_packages_count() {
        let job = job(vec![
            result("existing-bad", PackageStatus::Complete, 0.1),
            result("new-ok", PackageStatus::Complete, 0.9),
        ]);
        let report = evaluate(&job, &[new_pkg("new-ok")], &thresholds(50), false);
        assert_eq!(report.verdict, Verdict::Passed);
        assert_eq!(report.packages.len(), 1);
    }
}
