//! Error types for Tether.
//!
//! Content problems (cycles, dangling includes, stale manifests) are
//! findings, not errors. The types here cover what stops a file from being
//! indexed, what stops an edit from being applied, and the engine defects
//! that must abort a run.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, TetherError>;

/// A script that could not be turned into a `ScriptRecord`.
///
/// Localized to one file: the engine records it as a fatal finding for that
/// path and keeps going with the rest of the corpus.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("file is not valid UTF-8")]
    InvalidUtf8,

    #[error("file looks binary (NUL byte on line {line})")]
    Binary { line: usize },

    #[error("function index declared twice in header (lines {first} and {second})")]
    DuplicateManifest { first: usize, second: usize },

    #[error("body of function `{name}` opened on line {line} is never closed")]
    UnclosedFunction { name: String, line: usize },
}

/// Failures while applying or writing a set of line edits.
#[derive(Debug, Error)]
pub enum FixError {
    #[error("edits overlap: {first} and {second}")]
    Conflict { first: String, second: String },

    #[error("edit range {start}..{end} is outside the file ({len} lines)")]
    OutOfBounds { start: usize, end: usize, len: usize },

    #[error("refusing to write {0}: edits were not reverified")]
    Unverified(String),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Top-level error for an engine run.
#[derive(Debug, Error)]
pub enum TetherError {
    #[error("root {0} is not a directory")]
    InvalidRoot(PathBuf),

    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fix(#[from] FixError),

    /// A fix did not converge: re-running the analysis on the rewritten
    /// text still proposes edits. Indicates a bug in the fixer.
    #[error("fix for {path} did not converge ({category}): {detail}")]
    Consistency {
        path: String,
        category: String,
        detail: String,
    },

    /// An engine invariant was violated (e.g. non-deterministic graph
    /// construction). Never caused by the scripts being analyzed.
    #[error("internal defect: {0}")]
    Defect(String),
}

impl TetherError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TetherError::Io {
            path: path.into(),
            source,
        }
    }

    /// True for errors that indicate a tool bug rather than a content or
    /// environment problem.
    pub fn is_defect(&self) -> bool {
        matches!(
            self,
            TetherError::Consistency { .. }
                | TetherError::Defect(_)
                | TetherError::Fix(FixError::Conflict { .. })
                | TetherError::Fix(FixError::OutOfBounds { .. })
                | TetherError::Fix(FixError::Unverified(_))
        )
    }
}
