//! Directory scan: finds the scripts under a root and indexes them.
//!
//! Walks the tree respecting .gitignore and the configured skip list,
//! indexes every script on the rayon pool and returns the records sorted
//! by path, ready for `Model::build`.

use ignore::WalkBuilder;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

use super::types::ScriptRecord;
use crate::config::TetherConfig;
use crate::error::{ParseError, Result, TetherError};
use crate::parser::{index_bytes, IndexContext, ShellDialect};

/// Bytes read to sniff a shebang from an extensionless file.
const HEAD_LEN: usize = 256;

/// Records and per-file failures from one scan, both sorted by path.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub records: Vec<ScriptRecord>,
    pub parse_failures: Vec<(String, ParseError)>,
    pub stats: ScanStats,
}

enum Outcome {
    Indexed(ScriptRecord, ShellDialect),
    Failed(String, ParseError),
    NotScript,
    Unreadable,
}

/// Root-relative path with `/` separators.
pub fn rel_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Scan `root` and index every script found.
pub fn scan(root: &Path, config: &TetherConfig) -> Result<ScanResult> {
    if !root.is_dir() {
        return Err(TetherError::InvalidRoot(root.to_path_buf()));
    }

    let skip = config.scan.skip_dirs.clone();
    let files: Vec<PathBuf> = WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .git_global(true)
        .git_exclude(true)
        .filter_entry(move |entry| {
            let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
            !(entry.depth() > 0 && is_dir && skip.iter().any(|s| entry.file_name() == s.as_str()))
        })
        .build()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
        .filter(|entry| ShellDialect::is_candidate(entry.path(), &config.scan))
        .map(|entry| entry.into_path())
        .collect();
    debug!(root = %root.display(), candidates = files.len(), "walk complete");

    let ctx = IndexContext::from_config(config);
    let outcomes: Mutex<Vec<Outcome>> = Mutex::new(Vec::with_capacity(files.len()));
    let index_all = || {
        files.par_iter().for_each(|path| {
            let outcome = index_path(root, path, config, &ctx);
            if let Ok(mut out) = outcomes.lock() {
                out.push(outcome);
            }
        });
    };
    match rayon::ThreadPoolBuilder::new()
        .num_threads(config.scan.threads)
        .build()
    {
        Ok(pool) => pool.install(index_all),
        Err(e) => {
            warn!(error = %e, "could not build indexing pool, using the global one");
            index_all();
        }
    }
    let outcomes = outcomes
        .into_inner()
        .map_err(|_| TetherError::Defect("indexing worker panicked".into()))?;

    let mut result = ScanResult::default();
    result.stats.candidates = files.len();
    for outcome in outcomes {
        match outcome {
            Outcome::Indexed(record, dialect) => {
                *result.stats.dialects.entry(dialect.name()).or_default() += 1;
                result.records.push(record);
            }
            Outcome::Failed(rel, err) => result.parse_failures.push((rel, err)),
            Outcome::NotScript => {}
            Outcome::Unreadable => result.stats.unreadable += 1,
        }
    }
    result.records.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    result.parse_failures.sort_by(|a, b| a.0.cmp(&b.0));
    result.stats.indexed = result.records.len();
    result.stats.failed = result.parse_failures.len();

    info!(
        indexed = result.stats.indexed,
        failed = result.stats.failed,
        unreadable = result.stats.unreadable,
        "scan complete"
    );
    Ok(result)
}

fn index_path(root: &Path, path: &Path, config: &TetherConfig, ctx: &IndexContext) -> Outcome {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "skipping unreadable file");
            return Outcome::Unreadable;
        }
    };
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(HEAD_LEN)]);
    let Some(dialect) = ShellDialect::detect(path, Some(&head), &config.scan) else {
        return Outcome::NotScript;
    };

    let rel = rel_path(root, path);
    match index_bytes(path, &rel, &bytes, ctx) {
        Ok(record) => {
            debug!(file = %rel, functions = record.functions.len(), includes = record.includes.len(), "indexed");
            Outcome::Indexed(record, dialect)
        }
        Err(err) => {
            warn!(file = %rel, error = %err, "parse failed");
            Outcome::Failed(rel, err)
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanStats {
    /// Files that looked like scripts by name.
    pub candidates: usize,
    pub indexed: usize,
    pub failed: usize,
    pub unreadable: usize,
    pub dialects: BTreeMap<&'static str, usize>,
}

impl fmt::Display for ScanStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dialects: Vec<String> = self
            .dialects
            .iter()
            .map(|(name, n)| format!("{}: {}", name, n))
            .collect();
        write!(
            f,
            "Indexed {} scripts ({}), {} failed to parse, {} unreadable",
            self.indexed,
            dialects.join(", "),
            self.failed,
            self.unreadable
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_scan_sorts_and_skips() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("Utilities")).unwrap();
        fs::create_dir_all(root.join(".check")).unwrap();
        fs::write(root.join("b.sh"), "echo b\n").unwrap();
        fs::write(root.join("Utilities/a.sh"), "__a__() { :; }\n").unwrap();
        fs::write(root.join(".check/x.sh"), "echo x\n").unwrap();
        fs::write(root.join("notes.txt"), "not a script\n").unwrap();
        fs::write(root.join("tool"), "#!/usr/bin/env bash\necho tool\n").unwrap();
        fs::write(root.join("README"), "plain text\n").unwrap();

        let result = scan(root, &TetherConfig::default()).unwrap();
        let paths: Vec<&str> = result.records.iter().map(|r| r.rel_path.as_str()).collect();
        assert_eq!(paths, vec!["Utilities/a.sh", "b.sh", "tool"]);
        assert_eq!(result.stats.indexed, 3);
        assert_eq!(result.stats.dialects.get("bash"), Some(&1));
    }

    #[test]
    fn test_parse_failures_are_collected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bin.sh"), b"echo\0\x01").unwrap();
        fs::write(dir.path().join("ok.sh"), "echo ok\n").unwrap();

        let result = scan(dir.path(), &TetherConfig::default()).unwrap();
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.parse_failures.len(), 1);
        assert_eq!(result.parse_failures[0].0, "bin.sh");
        assert_eq!(result.parse_failures[0].1, ParseError::Binary { line: 1 });
    }

    #[test]
    fn test_invalid_root() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            scan(&missing, &TetherConfig::default()),
            Err(TetherError::InvalidRoot(_))
        ));
    }

    #[test]
    fn test_rel_path_uses_forward_slashes() {
        let root = Path::new("/corpus");
        assert_eq!(rel_path(root, &root.join("a").join("b.sh")), "a/b.sh");
    }
}
