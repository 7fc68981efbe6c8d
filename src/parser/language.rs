//! Shell dialect detection.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::ScanConfig;

/// Shells whose scripts are indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShellDialect {
    Sh,
    Bash,
    Dash,
    Ksh,
    Zsh,
}

impl ShellDialect {
    /// Detect from the file extension, limited to the configured extensions.
    pub fn from_path(path: &Path, extensions: &[String]) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        if !extensions.iter().any(|e| e.trim_start_matches('.') == ext) {
            return None;
        }
        match ext {
            "bash" => Some(ShellDialect::Bash),
            "ksh" => Some(ShellDialect::Ksh),
            "zsh" => Some(ShellDialect::Zsh),
            "dash" => Some(ShellDialect::Dash),
            _ => Some(ShellDialect::Sh),
        }
    }

    /// Detect from a `#!` line: `#!/bin/bash`, `#!/usr/bin/env bash`, ...
    pub fn from_shebang(first_line: &str) -> Option<Self> {
        let rest = first_line.strip_prefix("#!")?.trim();
        let mut parts = rest.split_whitespace();
        let mut program = parts.next()?.rsplit('/').next()?;
        if program == "env" {
            program = parts.find(|p| !p.starts_with('-'))?;
        }
        match program {
            "sh" => Some(ShellDialect::Sh),
            "bash" => Some(ShellDialect::Bash),
            "dash" => Some(ShellDialect::Dash),
            "ksh" | "mksh" => Some(ShellDialect::Ksh),
            "zsh" => Some(ShellDialect::Zsh),
            _ => None,
        }
    }

    /// Decide whether a file belongs to the corpus. `head` is the start of
    /// the file and is only consulted for extensionless files.
    pub fn detect(path: &Path, head: Option<&str>, config: &ScanConfig) -> Option<Self> {
        if let Some(dialect) = Self::from_path(path, &config.extensions) {
            return Some(dialect);
        }
        if !config.shebang_detection || path.extension().is_some() {
            return None;
        }
        head.and_then(|h| h.lines().next()).and_then(Self::from_shebang)
    }

    /// Whether the path might be a script before reading it.
    pub fn is_candidate(path: &Path, config: &ScanConfig) -> bool {
        Self::from_path(path, &config.extensions).is_some()
            || (config.shebang_detection && path.extension().is_none())
    }

    pub fn name(&self) -> &'static str {
        match self {
            ShellDialect::Sh => "sh",
            ShellDialect::Bash => "bash",
            ShellDialect::Dash => "dash",
            ShellDialect::Ksh => "ksh",
            ShellDialect::Zsh => "zsh",
        }
    }
}
