//! Report synthesizer: weighted scoring, compliance levels, and
//! Markdown/JSON rendering.
//!
//! Scoring counts each requirement tag independently with weights
//! `MUST=10`, `SHOULD=3`, `MAY=1`; skipped tests are excluded from the
//! attempted denominator. Generated documents are byte-identical for
//! identical inputs modulo the timestamp, and test ordering within
//! sections is registration order.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::compat::ServerProfile;
use crate::error::{McpCheckError, Result};
use crate::harness::protocol::ProtocolVersion;
use crate::harness::runner::{RunSummary, TestResult};
use crate::suites::RequirementLevel;

/// Longest message rendered inside a Markdown table cell.
const TABLE_MESSAGE_LIMIT: usize = 160;

/// Severity emojis, matching the levels in the breakdown tables.
const CRITICAL_EMOJI: &str = "🔴";
const MEDIUM_EMOJI: &str = "🟠";
const LOW_EMOJI: &str = "🟢";

// ---------------------------------------------------------------------------
// Server name beautification
// ---------------------------------------------------------------------------

/// Derive a clean display name from the server command or URL.
///
/// Deterministic: strips paths, unwraps npm `@scope/package` commands,
/// drops a `.py` suffix, turns dashes/underscores into spaces, removes a
/// leading `server` word, and title-cases the rest.
pub fn extract_server_name(server_command: &str) -> String {
    let mut name = if server_command.contains('/') {
        server_command
            .rsplit('/')
            .next()
            .unwrap_or(server_command)
            .to_string()
    } else {
        server_command.to_string()
    };

    if server_command.contains("npx") && server_command.contains('@') {
        // `npx -y @modelcontextprotocol/server-brave-search` keeps only
        // the package basename.
        if let Some(after_at) = server_command.split('@').nth(1) {
            if let Some(package) = after_at.split('/').nth(1) {
                name = package.split_whitespace().next().unwrap_or(package).to_string();
            }
        }
    } else {
        name = name
            .split_whitespace()
            .next()
            .unwrap_or(&name)
            .to_string();
    }

    if let Some(stripped) = name.strip_suffix(".py") {
        name = stripped.to_string();
    }

    // Replacement order matters: the `server ` prefix-word is removed
    // after dashes become spaces but before underscores do.
    let name = name.replace('-', " ").replace("server ", "").replace('_', " ");

    let words: Vec<String> = name
        .split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect();

    if words.is_empty() {
        "Server".to_string()
    } else {
        words.join(" ")
    }
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Per-severity tally of requirement tags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    /// Tags on passed tests.
    pub passed: usize,
    /// Tags on failed tests.
    pub failed: usize,
    /// Tags on skipped tests.
    pub skipped: usize,
}

impl Tally {
    /// All tags seen, including skipped.
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped
    }

    /// Tags actually attempted (skipped excluded).
    pub fn attempted(&self) -> usize {
        self.passed + self.failed
    }

    /// Plain pass-rate over all tags, as a percentage.
    pub fn compliance(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.passed as f64 / self.total() as f64 * 100.0
        }
    }
}

/// Overall compliance classification from the weighted score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComplianceLevel {
    /// Score 100 with zero MUST failures.
    FullyCompliant,
    /// Score ≥ 90.
    SubstantiallyCompliant,
    /// Score ≥ 75.
    PartiallyCompliant,
    /// Score ≥ 50.
    MinimallyCompliant,
    /// Everything else.
    NonCompliant,
}

impl ComplianceLevel {
    /// Human label.
    pub fn label(&self) -> &'static str {
        match self {
            ComplianceLevel::FullyCompliant => "Fully Compliant",
            ComplianceLevel::SubstantiallyCompliant => "Substantially Compliant",
            ComplianceLevel::PartiallyCompliant => "Partially Compliant",
            ComplianceLevel::MinimallyCompliant => "Minimally Compliant",
            ComplianceLevel::NonCompliant => "Non-Compliant",
        }
    }

    /// Status badge with emoji, e.g. `✅ Fully Compliant`.
    pub fn badge(&self) -> String {
        let emoji = match self {
            ComplianceLevel::FullyCompliant => "✅",
            ComplianceLevel::SubstantiallyCompliant | ComplianceLevel::PartiallyCompliant => "⚠️",
            ComplianceLevel::MinimallyCompliant | ComplianceLevel::NonCompliant => "❌",
        };
        format!("{} {}", emoji, self.label())
    }
}

/// Aggregated requirement tallies and the weighted score.
#[derive(Debug, Clone)]
pub struct Scoreboard {
    /// MUST-tag tally.
    pub must: Tally,
    /// SHOULD-tag tally.
    pub should: Tally,
    /// MAY-tag tally.
    pub may: Tally,
    /// Weighted score percentage over attempted tags.
    pub weighted_score: f64,
    /// Classification from the weighted score and MUST failures.
    pub level: ComplianceLevel,
}

impl Scoreboard {
    /// Tally every requirement tag in the run and compute the score.
    pub fn from_summary(summary: &RunSummary) -> Self {
        let mut must = Tally::default();
        let mut should = Tally::default();
        let mut may = Tally::default();

        for result in &summary.results {
            for requirement in result.requirements {
                let tally = match requirement.level {
                    RequirementLevel::Must => &mut must,
                    RequirementLevel::Should => &mut should,
                    RequirementLevel::May => &mut may,
                };
                if result.skipped {
                    tally.skipped += 1;
                } else if result.passed {
                    tally.passed += 1;
                } else {
                    tally.failed += 1;
                }
            }
        }

        let weighted = |tally: &Tally, level: RequirementLevel| {
            (
                tally.passed as f64 * level.weight() as f64,
                tally.attempted() as f64 * level.weight() as f64,
            )
        };
        let (must_score, must_total) = weighted(&must, RequirementLevel::Must);
        let (should_score, should_total) = weighted(&should, RequirementLevel::Should);
        let (may_score, may_total) = weighted(&may, RequirementLevel::May);

        let denominator = must_total + should_total + may_total;
        let weighted_score = if denominator > 0.0 {
            (must_score + should_score + may_score) / denominator * 100.0
        } else {
            // No tagged requirements attempted: fall back to the plain
            // pass-rate so an untagged run still reports something.
            summary.compliance_percentage()
        };

        let level = if weighted_score >= 100.0 && must.failed == 0 {
            ComplianceLevel::FullyCompliant
        } else if weighted_score >= 90.0 {
            ComplianceLevel::SubstantiallyCompliant
        } else if weighted_score >= 75.0 {
            ComplianceLevel::PartiallyCompliant
        } else if weighted_score >= 50.0 {
            ComplianceLevel::MinimallyCompliant
        } else {
            ComplianceLevel::NonCompliant
        };

        Self {
            must,
            should,
            may,
            weighted_score,
            level,
        }
    }
}

// ---------------------------------------------------------------------------
// Sectioning
// ---------------------------------------------------------------------------

/// Functional section a test belongs to, derived from its name.
pub fn section_for(test_name: &str) -> &'static str {
    let name = test_name.to_lowercase();
    if name.contains("resource") {
        "Resources"
    } else if name.contains("tool") {
        "Tools"
    } else if name.contains("ping") || name.contains("logging") {
        "Utilities"
    } else if name.contains("init")
        || name.contains("capabilit")
        || name.contains("version")
        || name.contains("shutdown")
    {
        "Lifecycle"
    } else if name.contains("elicitation") {
        "Features"
    } else {
        "Base Protocol"
    }
}

/// Section names in rendering order.
const SECTION_ORDER: &[&str] = &[
    "Base Protocol",
    "Lifecycle",
    "Features",
    "Resources",
    "Tools",
    "Utilities",
];

// ---------------------------------------------------------------------------
// Report context and rendering
// ---------------------------------------------------------------------------

/// Everything the synthesizer needs for one report.
#[derive(Debug, Clone)]
pub struct ReportContext<'a> {
    /// The run aggregate.
    pub summary: &'a RunSummary,
    /// Server command line or URL.
    pub server_command: &'a str,
    /// Negotiated protocol revision.
    pub protocol_version: ProtocolVersion,
    /// Selected server profile, when one matched.
    pub profile: Option<&'a ServerProfile>,
    /// Report timestamp (injected so rendering stays deterministic).
    pub timestamp: DateTime<Local>,
}

impl ReportContext<'_> {
    fn display_name(&self) -> String {
        extract_server_name(self.server_command)
    }

    fn is_http(&self) -> bool {
        self.server_command.starts_with("http://") || self.server_command.starts_with("https://")
    }

    /// File stem `<prefix>_<server-name>_<protocol>_<yyyymmdd_hhmmss>`.
    pub fn file_stem(&self, prefix: &str) -> String {
        format!(
            "{}_{}_{}_{}",
            prefix,
            self.display_name().replace(' ', "_"),
            self.protocol_version,
            self.timestamp.format("%Y%m%d_%H%M%S")
        )
    }
}

fn cell(message: &str) -> String {
    let escaped = message.replace('|', "\\|").replace('\n', " ");
    if escaped.chars().count() > TABLE_MESSAGE_LIMIT {
        let truncated: String = escaped.chars().take(TABLE_MESSAGE_LIMIT).collect();
        format!("{}...", truncated)
    } else {
        escaped
    }
}

fn pretty_test_name(name: &str) -> String {
    let stripped = name.strip_prefix("test_").unwrap_or(name);
    stripped
        .split('_')
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render the Markdown compliance report.
pub fn render_markdown(ctx: &ReportContext<'_>) -> String {
    let summary = ctx.summary;
    let scoreboard = Scoreboard::from_summary(summary);
    let display_name = ctx.display_name();
    let date = ctx.timestamp.format("%Y-%m-%d %H:%M:%S");

    let mut lines: Vec<String> = vec![
        format!("# {} MCP Compliance Report", display_name),
        String::new(),
        "## Server Information".to_string(),
        String::new(),
        format!("- **Server Command**: `{}`", ctx.server_command),
        format!("- **Protocol Version**: {}", ctx.protocol_version),
        format!("- **Test Date**: {}", date),
        String::new(),
    ];

    if let Some(profile) = ctx.profile {
        lines.push("## Server Configuration".to_string());
        lines.push(String::new());
        lines.push(format!("- **Profile**: {}", profile.name));
        if !profile.required_tools.is_empty() {
            lines.push(format!(
                "- **Required Tools**: {}",
                profile.required_tools.join(", ")
            ));
        }
        if !profile.skip_tests.is_empty() {
            lines.push(format!(
                "- **Skipped Tests**: {}",
                profile.skip_tests.join(", ")
            ));
        }
        lines.push(String::new());
    }

    // Summary totals.
    lines.push("## Summary".to_string());
    lines.push(String::new());
    lines.push(format!("- **Total Tests**: {}", summary.total));
    lines.push(format!("- **Passed**: {}", summary.passed));
    lines.push(format!("- **Failed**: {}", summary.failed));
    lines.push(format!("- **Skipped**: {}", summary.skipped));
    if summary.timeouts > 0 {
        lines.push(format!("- **Timeouts**: {}", summary.timeouts));
    }
    lines.push(String::new());
    lines.push(format!(
        "**Compliance Status**: {} ({:.1}%)",
        scoreboard.level.badge(),
        summary.compliance_percentage()
    ));
    lines.push(String::new());

    // Severity breakdown.
    lines.push("## Requirement Type Breakdown".to_string());
    lines.push(String::new());
    lines.push("| Requirement Type | Total | Passed | Failed | Skipped | Compliance |".to_string());
    lines.push("|------------------|-------|--------|--------|---------|------------|".to_string());
    for (emoji, label, severity, tally) in [
        (CRITICAL_EMOJI, "MUST", "Critical", &scoreboard.must),
        (MEDIUM_EMOJI, "SHOULD", "Medium", &scoreboard.should),
        (LOW_EMOJI, "MAY", "Low", &scoreboard.may),
    ] {
        lines.push(format!(
            "| {} **{}** ({}) | {} | {} | {} | {} | {:.1}% |",
            emoji,
            label,
            severity,
            tally.total(),
            tally.passed,
            tally.failed,
            tally.skipped,
            tally.compliance()
        ));
    }
    lines.push(String::new());
    lines.push(format!(
        "**Overall Weighted Score**: {:.1}% ({})",
        scoreboard.weighted_score,
        scoreboard.level.label()
    ));
    lines.push(String::new());

    // Functional section breakdown.
    lines.push("## Section Breakdown".to_string());
    lines.push(String::new());
    lines.push("| Section | Total | Passed | Failed | Compliance |".to_string());
    lines.push("|---------|-------|--------|--------|------------|".to_string());
    for section in SECTION_ORDER {
        let in_section: Vec<&TestResult> = summary
            .results
            .iter()
            .filter(|r| section_for(&r.name) == *section)
            .collect();
        if in_section.is_empty() {
            continue;
        }
        let passed = in_section.iter().filter(|r| r.passed && !r.skipped).count();
        let failed = in_section.iter().filter(|r| !r.passed).count();
        let attempted = passed + failed;
        let compliance = if attempted == 0 {
            "N/A".to_string()
        } else {
            format!("{:.1}%", passed as f64 / attempted as f64 * 100.0)
        };
        lines.push(format!(
            "| {} | {} | {} | {} | {} |",
            section,
            in_section.len(),
            passed,
            failed,
            compliance
        ));
    }
    lines.push(String::new());

    // Detailed results, registration order preserved.
    lines.push("## Detailed Results".to_string());
    lines.push(String::new());
    lines.push("### Passed Tests".to_string());
    lines.push(String::new());
    let passed_tests: Vec<&TestResult> = summary.results.iter().filter(|r| r.passed).collect();
    if passed_tests.is_empty() {
        lines.push("No tests passed.".to_string());
    } else {
        lines.push("| Test | Duration | Message |".to_string());
        lines.push("|------|----------|---------|".to_string());
        for test in &passed_tests {
            lines.push(format!(
                "| {} | {:.2}s | {} |",
                pretty_test_name(&test.name),
                test.duration_seconds,
                cell(&test.message)
            ));
        }
    }
    lines.push(String::new());
    lines.push("### Failed Tests".to_string());
    lines.push(String::new());
    let failed_tests: Vec<&TestResult> = summary.results.iter().filter(|r| !r.passed).collect();
    if failed_tests.is_empty() {
        lines.push("All tests passed! 🎉".to_string());
    } else {
        lines.push("| Test | Duration | Error Message |".to_string());
        lines.push("|------|----------|--------------|".to_string());
        for test in &failed_tests {
            lines.push(format!(
                "| {} | {:.2}s | {} |",
                pretty_test_name(&test.name),
                test.duration_seconds,
                cell(&test.message)
            ));
        }
    }

    // Diagnostics for non-critical timeouts (they are absent from the
    // failure table on purpose).
    let timed_out: Vec<&TestResult> = summary
        .results
        .iter()
        .filter(|r| r.timeout && r.non_critical)
        .collect();
    if !timed_out.is_empty() {
        lines.push(String::new());
        lines.push("### Diagnostics".to_string());
        lines.push(String::new());
        for test in timed_out {
            lines.push(format!(
                "- `{}` timed out but is non-critical for compliance",
                test.name
            ));
        }
    }

    // Remediation plan, severity order.
    lines.push(String::new());
    lines.push("## Remediation Plan".to_string());
    lines.push(String::new());
    if failed_tests.is_empty() {
        lines.push("No remediation required.".to_string());
    } else {
        let by_severity = |level: RequirementLevel| -> Vec<&TestResult> {
            failed_tests
                .iter()
                .filter(|t| {
                    let highest = t
                        .requirements
                        .iter()
                        .map(|r| r.level)
                        .min_by_key(|l| match l {
                            RequirementLevel::Must => 0,
                            RequirementLevel::Should => 1,
                            RequirementLevel::May => 2,
                        })
                        .unwrap_or(RequirementLevel::Must);
                    highest == level
                })
                .copied()
                .collect()
        };

        for (priority, title, level) in [
            ("Priority 1", "Critical Issues (Required for compliance)", RequirementLevel::Must),
            ("Priority 2", "Medium Issues (Recommended for best practices)", RequirementLevel::Should),
            ("Priority 3", "Low Issues (Optional enhancements)", RequirementLevel::May),
        ] {
            let tests = by_severity(level);
            if tests.is_empty() {
                continue;
            }
            lines.push(format!("### {}: {}", priority, title));
            for test in tests {
                let req_ids: Vec<&str> = test.requirements.iter().map(|r| r.id).collect();
                lines.push(format!(
                    "- Fix {} ({})",
                    test.name,
                    if req_ids.is_empty() {
                        "untagged".to_string()
                    } else {
                        req_ids.join(", ")
                    }
                ));
            }
            lines.push(String::new());
        }
    }

    lines.push(String::new());
    lines.push("---".to_string());
    lines.push(format!("Generated by mcpcheck on {}", date));

    lines.join("\n")
}

/// Render the JSON compliance report.
pub fn render_json(ctx: &ReportContext<'_>) -> serde_json::Value {
    let summary = ctx.summary;
    let scoreboard = Scoreboard::from_summary(summary);

    let mut doc = serde_json::json!({
        "server": ctx.display_name(),
        "protocol_version": ctx.protocol_version.as_str(),
        "timestamp": ctx.timestamp.format("%Y%m%d_%H%M%S").to_string(),
        "total_tests": summary.total,
        "passed_tests": summary.passed,
        "failed_tests": summary.failed,
        "skipped_tests": summary.skipped,
        "compliance_percentage": summary.compliance_percentage(),
        "compliance_status": scoreboard.level.badge(),
        "results": summary.results,
    });

    if ctx.is_http() {
        doc["server_url"] = serde_json::Value::String(ctx.server_command.to_string());
    }

    doc
}

/// Write the Markdown (and optionally JSON) reports under `output_dir`.
///
/// Returns the paths written, Markdown first.
pub fn write_reports(
    ctx: &ReportContext<'_>,
    output_dir: &Path,
    prefix: &str,
    emit_json: bool,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir).map_err(|e| {
        anyhow::anyhow!(McpCheckError::Report(format!(
            "cannot create report directory {}: {}",
            output_dir.display(),
            e
        )))
    })?;

    let stem = ctx.file_stem(prefix);
    let mut written = Vec::new();

    let markdown_path = output_dir.join(format!("{}.md", stem));
    std::fs::write(&markdown_path, render_markdown(ctx))?;
    written.push(markdown_path);

    if emit_json {
        let json_path = output_dir.join(format!("{}.json", stem));
        let doc = render_json(ctx);
        std::fs::write(&json_path, serde_json::to_string_pretty(&doc)?)?;
        written.push(json_path);
    }

    Ok(written)
}
