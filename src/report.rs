//! Rendering a `RunReport`: grouped text for terminals, JSON for tools.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;

use crate::analysis::cycles::Cycle;
use crate::check::{Counts, Mode, RunReport};
use crate::error::{Result, TetherError};
use crate::finding::{Category, Finding, Severity};

#[derive(Debug, Clone, Copy, Default)]
pub struct TextOptions {
    /// Include info-level findings.
    pub show_info: bool,
    /// Print the diff of every planned or applied fix.
    pub show_diffs: bool,
}

/// Findings grouped by file, then category.
type Grouped<'a> = BTreeMap<&'a str, BTreeMap<Category, Vec<&'a Finding>>>;

fn group<'a>(findings: impl Iterator<Item = &'a Finding>) -> Grouped<'a> {
    let mut grouped: Grouped<'a> = BTreeMap::new();
    for finding in findings {
        grouped
            .entry(finding.file.as_str())
            .or_default()
            .entry(finding.category)
            .or_default()
            .push(finding);
    }
    grouped
}

fn write_section(out: &mut String, title: &str, grouped: &Grouped<'_>) {
    if grouped.is_empty() {
        return;
    }
    let _ = writeln!(out, "── {} ──", title);
    for (file, categories) in grouped {
        let _ = writeln!(out, "{}", file);
        for (category, findings) in categories {
            let _ = writeln!(out, "  [{}]", category);
            for f in findings {
                let fixed = if f.fixed { " (fixed)" } else { "" };
                match f.line {
                    Some(line) => {
                        let _ = writeln!(out, "    {}: {}{}", line, f.message, fixed);
                    }
                    None => {
                        let _ = writeln!(out, "    {}{}", f.message, fixed);
                    }
                }
            }
        }
    }
    out.push('\n');
}

pub fn render_text(report: &RunReport, options: TextOptions) -> String {
    let mut out = String::new();
    let by = |severity: Severity| report.findings.iter().filter(move |f| f.severity == severity);

    write_section(&mut out, "Fatal", &group(by(Severity::Fatal)));
    write_section(&mut out, "Advisory", &group(by(Severity::Advisory)));
    if options.show_info {
        write_section(&mut out, "Info", &group(by(Severity::Info)));
    }

    if !report.fixes.is_empty() {
        let verb = match report.mode {
            Mode::Fix => "Applied",
            Mode::ReportOnly => "Planned (run with --fix to apply)",
        };
        let _ = writeln!(out, "── {} fixes ──", verb);
        for fix in &report.fixes {
            let cats: Vec<&str> = fix.categories.iter().map(|c| c.as_str()).collect();
            let _ = writeln!(out, "{} ({})", fix.path, cats.join(", "));
        }
        out.push('\n');
        if options.show_diffs {
            for fix in &report.fixes {
                out.push_str(&fix.diff);
            }
            out.push('\n');
        }
    }

    let _ = writeln!(out, "{}", report.scan);
    let _ = writeln!(out, "{}", report.model);
    let _ = writeln!(out, "{}", summary_line(&report.counts()));
    let _ = writeln!(out, "{}", if report.passed() { "PASS" } else { "FAIL" });
    out
}

fn summary_line(counts: &Counts) -> String {
    format!(
        "{} fatal, {} advisory, {} info, {} fixed",
        counts.fatal, counts.advisory, counts.info, counts.fixed
    )
}

#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    report: &'a RunReport,
    counts: Counts,
    exit_code: i32,
    passed: bool,
}

pub fn render_json(report: &RunReport) -> Result<String> {
    let json = JsonReport {
        report,
        counts: report.counts(),
        exit_code: report.exit_code(),
        passed: report.passed(),
    };
    serde_json::to_string_pretty(&json)
        .map_err(|e| TetherError::Defect(format!("report serialization failed: {}", e)))
}

pub fn render_cycles(cycles: &[Cycle]) -> String {
    if cycles.is_empty() {
        return "No include cycles.\n".to_string();
    }
    let mut out = String::new();
    for (i, cycle) in cycles.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, cycle.display_path());
    }
    let _ = writeln!(out, "{} cycle(s)", cycles.len());
    out
}
