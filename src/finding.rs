//! Findings: content problems reported by the graph builder and analyses.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// How bad a finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Context only; never affects the exit code.
    Info,
    /// Reported; fatal only under `strict`.
    Advisory,
    /// Fails the run unless fixed.
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Advisory => write!(f, "advisory"),
            Severity::Fatal => write!(f, "fatal"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    ParseError,
    DanglingInclude,
    IncludeNeedsReview,
    UnresolvedCall,
    AmbiguousCall,
    ShadowedDefinition,
    Cycle,
    DeadFunction,
    UnreachedGlobal,
    FunctionIndex,
    MissingInclude,
    UnusedInclude,
    LineEndings,
    Documentation,
    ScriptNotes,
    LoggingCoverage,
    ErrorHandling,
    Security,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::ParseError => "parse-error",
            Category::DanglingInclude => "dangling-include",
            Category::IncludeNeedsReview => "include-needs-review",
            Category::UnresolvedCall => "unresolved-call",
            Category::AmbiguousCall => "ambiguous-call",
            Category::ShadowedDefinition => "shadowed-definition",
            Category::Cycle => "cycle",
            Category::DeadFunction => "dead-function",
            Category::UnreachedGlobal => "unreached-global",
            Category::FunctionIndex => "function-index",
            Category::MissingInclude => "missing-include",
            Category::UnusedInclude => "unused-include",
            Category::LineEndings => "line-endings",
            Category::Documentation => "documentation",
            Category::ScriptNotes => "script-notes",
            Category::LoggingCoverage => "logging-coverage",
            Category::ErrorHandling => "error-handling",
            Category::Security => "security",
        }
    }

    /// Severity before `strict` promotion.
    pub fn default_severity(&self) -> Severity {
        match self {
            Category::ParseError | Category::DanglingInclude | Category::Cycle => Severity::Fatal,
            Category::IncludeNeedsReview | Category::ShadowedDefinition => Severity::Info,
            _ => Severity::Advisory,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub category: Category,
    pub severity: Severity,
    /// Root-relative path.
    pub file: String,
    /// 1-indexed line, when the finding points at one.
    pub line: Option<usize>,
    pub message: String,
    /// Resolved by an edit applied in this run.
    pub fixed: bool,
}

impl Finding {
    pub fn new(
        category: Category,
        file: impl Into<String>,
        line: Option<usize>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            severity: category.default_severity(),
            file: file.into(),
            line,
            message: message.into(),
            fixed: false,
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// `strict` turns advisories into failures.
    pub fn promote(&mut self) {
        if self.severity == Severity::Advisory {
            self.severity = Severity::Fatal;
        }
    }

    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Fatal && !self.fixed
    }
}

impl Ord for Finding {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.file, self.line, self.category, &self.message).cmp(&(
            &other.file,
            other.line,
            other.category,
            &other.message,
        ))
    }
}

impl PartialOrd for Finding {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}: ", self.file, line)?,
            None => write!(f, "{}: ", self.file)?,
        }
        write!(f, "[{}] {}", self.category, self.message)?;
        if self.fixed {
            write!(f, " (fixed)")?;
        }
        Ok(())
    }
}
