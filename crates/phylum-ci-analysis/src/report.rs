//! Rendering of policy reports as markdown comments, text, and JSON.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use phylum_ci_core::{PhylumCiError, RiskDomain, Verdict};
use phylum_ci_platforms::COMMENT_MARKER;
use serde::Serialize;

use crate::pipeline::{PipelineResult, RunOutcome};
use crate::policy::{PackageEvaluation, PolicyReport};

fn verdict_icon(verdict: Verdict) -> &'static str {
    match verdict {
        Verdict::Passed => "\u{2705}",
        Verdict::Failed => "\u{274c}",
        Verdict::Incomplete => "\u{23f3}",
    }
}

fn summary(report: &PolicyReport) -> String {
    let scope = if report.all_deps { "dependencies" } else { "new dependencies" };
    let evaluated = report.packages.len() + report.pending.len();
    match report.verdict {
        Verdict::Passed => format!("All {evaluated} {scope} passed the configured risk thresholds."),
        Verdict::Failed => format!(
            "{} of {evaluated} {scope} failed the configured risk thresholds.",
            report.failures().count()
        ),
        Verdict::Incomplete => format!(
            "No violations so far, but {} of {evaluated} {scope} are still being processed. \
             Re-run once processing completes for a full verdict.",
            report.pending.len()
        ),
    }
}

fn score_cell(pkg: &PackageEvaluation, domain: RiskDomain) -> String {
    let Some(score) = pkg.scores.get(domain) else {
        return "-".into();
    };
    let pct = (score * 100.0).round() as i64;
    if pkg.violations.iter().any(|v| v.domain == domain) {
        format!("**{pct}**")
    } else {
        pct.to_string()
    }
}

/// Markdown comment for a pull request.
///
/// The last line is [`COMMENT_MARKER`], which identifies earlier comments
/// from this tool.
pub fn format_markdown(report: &PolicyReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "## {} Phylum OSS Supply Chain Risk Analysis - {}\n",
        verdict_icon(report.verdict),
        report.verdict
    );
    let _ = writeln!(out, "{}\n", summary(report));

    out.push_str("| Risk Domain | Threshold |\n|---|---|\n");
    for domain in RiskDomain::ALL {
        let threshold = report.thresholds.get(domain);
        let value = if threshold == 0 {
            "disabled".to_string()
        } else {
            threshold.to_string()
        };
        let _ = writeln!(out, "| {domain} | {value} |");
    }
    out.push('\n');

    if !report.packages.is_empty() {
        out.push_str("### Dependencies\n\n");
        out.push_str("| Package | Version | Ecosystem |");
        for domain in RiskDomain::ALL {
            let _ = write!(out, " {domain} |");
        }
        out.push_str("\n|---|---|---|");
        out.push_str(&"---|".repeat(RiskDomain::ALL.len()));
        out.push('\n');
        for pkg in &report.packages {
            let name = if pkg.failed() {
                format!("\u{274c} {}", pkg.package.name)
            } else {
                pkg.package.name.clone()
            };
            let _ = write!(
                out,
                "| {name} | {} | {} |",
                pkg.package.version, pkg.package.ecosystem
            );
            for domain in RiskDomain::ALL {
                let _ = write!(out, " {} |", score_cell(pkg, domain));
            }
            out.push('\n');
        }
        out.push('\n');

        let issues: Vec<_> = report
            .failures()
            .flat_map(|pkg| pkg.issues.iter().map(move |issue| (pkg, issue)))
            .collect();
        if !issues.is_empty() {
            out.push_str("<details>\n<summary>Issues</summary>\n\n");
            for (pkg, issue) in issues {
                let severity = if issue.severity.is_empty() {
                    String::new()
                } else {
                    format!(" ({})", issue.severity)
                };
                let _ = writeln!(out, "- `{}`: {}{severity}", pkg.package, issue.title);
            }
            out.push_str("\n</details>\n\n");
        }
    }

    if !report.pending.is_empty() {
        out.push_str("### Still processing\n\n");
        for id in &report.pending {
            let _ = writeln!(out, "- `{id}`");
        }
        out.push('\n');
    }

    let label = report.label.as_deref().unwrap_or("-");
    let _ = writeln!(out, "<sub>Label: `{label}` | Job: `{}`</sub>\n", report.job_id);
    out.push_str(COMMENT_MARKER);
    out.push('\n');
    out
}

/// Plain-text summary for terminals and CI logs.
pub fn format_text(report: &PolicyReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Phylum analysis: {}", report.verdict);
    let _ = writeln!(out, "{}", summary(report));

    let thresholds: Vec<String> = RiskDomain::ALL
        .iter()
        .filter(|d| report.thresholds.get(**d) > 0)
        .map(|d| format!("{}={}", d.short(), report.thresholds.get(*d)))
        .collect();
    if thresholds.is_empty() {
        let _ = writeln!(out, "Thresholds: none enabled");
    } else {
        let _ = writeln!(out, "Thresholds: {}", thresholds.join(" "));
    }

    for pkg in report.failures() {
        let _ = writeln!(out, "\n  FAIL {}", pkg.package);
        for violation in &pkg.violations {
            let _ = writeln!(
                out,
                "    {}: {:.0} < {}",
                violation.domain,
                violation.score * 100.0,
                violation.threshold
            );
        }
        for issue in &pkg.issues {
            let _ = writeln!(out, "    - {}", issue.title);
        }
    }
    if !report.pending.is_empty() {
        let _ = writeln!(out, "\n  Still processing:");
        for id in &report.pending {
            let _ = writeln!(out, "    {id}");
        }
    }
    let _ = writeln!(out, "\nJob: {}", report.job_id);
    out
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonOutput<'a> {
    generated_at: DateTime<Utc>,
    return_code: i32,
    #[serde(flatten)]
    outcome: &'a RunOutcome,
}

/// JSON document describing a run.
///
/// # Errors
///
/// Returns [`PhylumCiError::Serialization`] if serialization fails.
pub fn format_json(result: &PipelineResult) -> Result<String, PhylumCiError> {
    let output = JsonOutput {
        generated_at: Utc::now(),
        return_code: result.return_code.code(),
        outcome: &result.outcome,
    };
    serde_json::to_string_pretty(&output).map_err(PhylumCiError::from)
}

/// Human-readable rendering of any run outcome.
pub fn format_outcome_text(outcome: &RunOutcome) -> String {
    match outcome {
        RunOutcome::NoChanges => {
            "No dependency file changes detected; nothing to analyze.\n".to_string()
        }
        RunOutcome::NoNewDependencies => {
            "No new dependencies introduced; nothing to analyze.\n".to_string()
        }
        RunOutcome::Analyzed { report, .. } => format_text(report),
    }
}

/// Markdown rendering of any run outcome.
pub fn format_outcome_markdown(outcome: &RunOutcome) -> String {
    match outcome {
        RunOutcome::Analyzed { report, .. } => format_markdown(report),
        other => format_outcome_text(other),
    }
}
