//! Analyses over the shared `Model`.
//!
//! Each analysis reads the model and returns proposals: a finding plus,
//! when it can be fixed mechanically, the edit that fixes it. Analyses
//! never mutate the model or touch the filesystem.

pub mod cycles;
pub mod docs;
pub mod error_handling;
pub mod index_sync;
pub mod line_endings;
pub mod logging;
pub mod reachability;
pub mod script_notes;
pub mod security;
pub mod source_calls;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::finding::Finding;
use crate::fix::LineEdit;
use crate::graph::{Model, ScriptRecord};
use crate::parser::lexer::{LineScan, Lexer};

/// Analyses that can be enabled or skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Analysis {
    Cycles,
    DeadCode,
    FunctionIndex,
    SourceCalls,
    LineEndings,
    Docs,
    ScriptNotes,
    LoggingCoverage,
    ErrorHandling,
    Security,
}

impl Analysis {
    pub const ALL: [Analysis; 10] = [
        Analysis::Cycles,
        Analysis::DeadCode,
        Analysis::FunctionIndex,
        Analysis::SourceCalls,
        Analysis::LineEndings,
        Analysis::Docs,
        Analysis::ScriptNotes,
        Analysis::LoggingCoverage,
        Analysis::ErrorHandling,
        Analysis::Security,
    ];

    /// Enabled unless a run asks otherwise. The style and hygiene checks
    /// are opt-in.
    pub const DEFAULT: [Analysis; 6] = [
        Analysis::Cycles,
        Analysis::DeadCode,
        Analysis::FunctionIndex,
        Analysis::SourceCalls,
        Analysis::LineEndings,
        Analysis::Docs,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Analysis::Cycles => "cycles",
            Analysis::DeadCode => "dead-code",
            Analysis::FunctionIndex => "function-index",
            Analysis::SourceCalls => "source-calls",
            Analysis::LineEndings => "line-endings",
            Analysis::Docs => "docs",
            Analysis::ScriptNotes => "script-notes",
            Analysis::LoggingCoverage => "logging-coverage",
            Analysis::ErrorHandling => "error-handling",
            Analysis::Security => "security",
        }
    }

    /// Run this analysis over `model`.
    pub fn run(&self, model: &Model, strict: bool) -> Vec<Proposal> {
        match self {
            Analysis::Cycles => cycles::run(model),
            Analysis::DeadCode => reachability::run(model),
            Analysis::FunctionIndex => index_sync::run(model),
            Analysis::SourceCalls => source_calls::run(model),
            Analysis::LineEndings => line_endings::run(model),
            Analysis::Docs => docs::run(model, strict),
            Analysis::ScriptNotes => script_notes::run(model),
            Analysis::LoggingCoverage => logging::run(model),
            Analysis::ErrorHandling => error_handling::run(model, strict),
            Analysis::Security => security::run(model),
        }
    }
}

impl fmt::Display for Analysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Analysis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Analysis::ALL
            .iter()
            .copied()
            .find(|a| a.name() == s)
            .ok_or_else(|| {
                let known: Vec<_> = Analysis::ALL.iter().map(|a| a.name()).collect();
                format!("unknown analysis `{}` (expected one of: {})", s, known.join(", "))
            })
    }
}

/// The analyses enabled for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisSet(BTreeSet<Analysis>);

impl Default for AnalysisSet {
    fn default() -> Self {
        Self(Analysis::DEFAULT.iter().copied().collect())
    }
}

impl AnalysisSet {
    pub fn all() -> Self {
        Self(Analysis::ALL.iter().copied().collect())
    }

    pub fn only(analyses: impl IntoIterator<Item = Analysis>) -> Self {
        Self(analyses.into_iter().collect())
    }

    pub fn with(mut self, analysis: Analysis) -> Self {
        self.0.insert(analysis);
        self
    }

    pub fn without(mut self, analysis: Analysis) -> Self {
        self.0.remove(&analysis);
        self
    }

    pub fn contains(&self, analysis: Analysis) -> bool {
        self.0.contains(&analysis)
    }

    /// Enabled analyses in a fixed order.
    pub fn iter(&self) -> impl Iterator<Item = Analysis> + '_ {
        self.0.iter().copied()
    }
}

/// Non-comment lines outside heredoc bodies, 1-indexed, with their scan.
pub(crate) fn code_lines(record: &ScriptRecord) -> Vec<(usize, &str, LineScan)> {
    let mut lexer = Lexer::new();
    let mut out = Vec::new();
    for (idx, line) in record.lines().into_iter().enumerate() {
        let scan = lexer.scan_line(line);
        if scan.heredoc_body || line.trim_start().starts_with('#') {
            continue;
        }
        out.push((idx + 1, line, scan));
    }
    out
}

/// How a finding can be fixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fix {
    /// Needs a human.
    Manual,
    /// Fixed by this line edit.
    Edit(LineEdit),
    /// Fixed by rewriting every line terminator to LF.
    NormalizeLineEndings,
    /// Fixed by an edit attached to another proposal for the same file.
    Shared,
}

impl Fix {
    pub fn is_automatic(&self) -> bool {
        !matches!(self, Fix::Manual)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    pub finding: Finding,
    pub fix: Fix,
}

impl Proposal {
    pub fn manual(finding: Finding) -> Self {
        Self {
            finding,
            fix: Fix::Manual,
        }
    }

    pub fn with_edit(finding: Finding, edit: LineEdit) -> Self {
        Self {
            finding,
            fix: Fix::Edit(edit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_names_round_trip() {
        for analysis in Analysis::ALL {
            assert_eq!(analysis.name().parse::<Analysis>().unwrap(), analysis);
        }
        assert!("nope".parse::<Analysis>().is_err());
    }

    #[test]
    fn test_analysis_set() {
        let set = AnalysisSet::all().without(Analysis::Docs);
        assert!(!set.contains(Analysis::Docs));
        assert!(set.contains(Analysis::Cycles));
        let only = AnalysisSet::only([Analysis::FunctionIndex]);
        assert_eq!(only.iter().collect::<Vec<_>>(), vec![Analysis::FunctionIndex]);
    }

    #[test]
    fn test_hygiene_checks_are_opt_in() {
        let set = AnalysisSet::default();
        assert!(set.contains(Analysis::Docs));
        assert!(!set.contains(Analysis::ScriptNotes));
        assert!(!set.contains(Analysis::Security));
        assert!(set.with(Analysis::Security).contains(Analysis::Security));
        assert_eq!(AnalysisSet::all().iter().count(), Analysis::ALL.len());
    }
}
