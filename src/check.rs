//! The engine entry point: scan, index, build the model once, run the
//! enabled analyses, then plan, reverify and (in fix mode) write edits.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::analysis::{Analysis, AnalysisSet, Fix, Proposal};
use crate::config::TetherConfig;
use crate::error::{ConfigError, ParseError, Result, TetherError};
use crate::finding::{Category, Finding, Severity};
use crate::fix::Transaction;
use crate::graph::{builder, Model, ModelStats, ScanStats};
use crate::parser::{index_source, IndexContext};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Compute findings and diffs, write nothing.
    #[default]
    ReportOnly,
    /// Write every reverified edit.
    Fix,
}

/// Where the configuration comes from.
#[derive(Debug, Clone, Default)]
pub enum ConfigSource {
    /// `<root>/.tether.toml` if present, defaults otherwise.
    #[default]
    Discover,
    /// An explicit file; it must exist.
    File(PathBuf),
    Inline(TetherConfig),
}

impl ConfigSource {
    pub fn load(&self, root: &Path) -> Result<TetherConfig> {
        match self {
            ConfigSource::Discover => Ok(TetherConfig::load_from_root(root)?),
            ConfigSource::File(path) => {
                if !path.is_file() {
                    return Err(ConfigError::Read {
                        path: path.clone(),
                        source: io::Error::from(io::ErrorKind::NotFound),
                    }
                    .into());
                }
                Ok(TetherConfig::load(path)?)
            }
            ConfigSource::Inline(config) => Ok(config.clone()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckOptions {
    pub root: PathBuf,
    pub mode: Mode,
    pub analyses: AnalysisSet,
    /// Advisory findings fail the run.
    pub strict: bool,
    pub config: ConfigSource,
}

impl CheckOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            mode: Mode::ReportOnly,
            analyses: AnalysisSet::default(),
            strict: false,
            config: ConfigSource::Discover,
        }
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_analyses(mut self, analyses: AnalysisSet) -> Self {
        self.analyses = analyses;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_config(mut self, config: ConfigSource) -> Self {
        self.config = config;
        self
    }
}

/// Planned or applied edits for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFix {
    pub path: String,
    pub categories: Vec<Category>,
    pub diff: String,
    /// Written to disk (fix mode only).
    pub applied: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub fatal: usize,
    pub advisory: usize,
    pub info: usize,
    pub fixed: usize,
    pub by_category: BTreeMap<Category, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub mode: Mode,
    pub strict: bool,
    /// Sorted by file, line, category.
    pub findings: Vec<Finding>,
    pub fixes: Vec<FileFix>,
    pub scan: ScanStats,
    pub model: ModelStats,
}

impl RunReport {
    pub fn counts(&self) -> Counts {
        let mut counts = Counts::default();
        for finding in &self.findings {
            match finding.severity {
                Severity::Fatal => counts.fatal += 1,
                Severity::Advisory => counts.advisory += 1,
                Severity::Info => counts.info += 1,
            }
            if finding.fixed {
                counts.fixed += 1;
            }
            *counts.by_category.entry(finding.category).or_default() += 1;
        }
        counts
    }

    /// Findings that fail the run.
    pub fn blocking(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.is_blocking())
    }

    /// `0` when nothing blocks, `1` otherwise. Engine defects never get
    /// here: they are returned as `Err`.
    pub fn exit_code(&self) -> i32 {
        if self.blocking().next().is_some() {
            1
        } else {
            0
        }
    }

    pub fn passed(&self) -> bool {
        self.exit_code() == 0
    }
}

/// Scan and index `options.root` and build the model, without analyses.
pub fn build_model(options: &CheckOptions) -> Result<(Model, builder::ScanResult)> {
    let root = options.root.as_path();
    if !root.is_dir() {
        return Err(TetherError::InvalidRoot(root.to_path_buf()));
    }
    let config = options.config.load(root)?;
    let mut scan = builder::scan(root, &config)?;
    let records = std::mem::take(&mut scan.records);
    let unparsed = scan.parse_failures.iter().map(|(rel, _)| rel.clone()).collect();
    let model = Model::build_with_unparsed(records, unparsed, root, &config);
    if config.engine.self_check {
        self_check(&model)?;
    }
    Ok((model, scan))
}

/// Rebuild from reversed input; the snapshots must match byte for byte.
fn self_check(model: &Model) -> Result<()> {
    let mut reversed = model.records.clone();
    reversed.reverse();
    let again =
        Model::build_with_unparsed(reversed, model.unparsed.clone(), &model.root, &model.config);
    if model.snapshot_json()? != again.snapshot_json()? {
        return Err(TetherError::Defect(
            "model snapshot depends on input order".into(),
        ));
    }
    debug!("self check passed");
    Ok(())
}

/// Run a full check.
pub fn run(options: &CheckOptions) -> Result<RunReport> {
    let (model, scan) = build_model(options)?;

    let mut findings: Vec<Finding> = scan
        .parse_failures
        .iter()
        .map(|(rel, err)| {
            Finding::new(Category::ParseError, rel, parse_error_line(err), err.to_string())
        })
        .collect();
    findings.extend(model.findings.iter().cloned());

    let mut proposals: Vec<(Analysis, Proposal)> = Vec::new();
    for analysis in options.analyses.iter() {
        let found = analysis.run(&model, options.strict);
        debug!(analysis = %analysis, proposals = found.len(), "analysis done");
        proposals.extend(found.into_iter().map(|p| (analysis, p)));
    }

    let (mut transactions, contributing) = plan(&model, &proposals);
    let mut texts = BTreeMap::new();
    for (rel, tx) in transactions.iter_mut() {
        texts.insert(rel.clone(), tx.apply()?);
    }
    if !transactions.is_empty() {
        reverify(&model, &texts, &contributing, options.strict)?;
        for tx in transactions.values_mut() {
            tx.mark_reverified();
        }
    }

    let write = options.mode == Mode::Fix;
    let mut fixes = Vec::with_capacity(transactions.len());
    for (rel, tx) in transactions.iter_mut() {
        let diff = tx.diff();
        if write {
            let path = model
                .record(rel)
                .map(|r| r.path.clone())
                .unwrap_or_else(|| model.root.join(rel));
            tx.commit(&path)?;
            info!(file = %rel, "fixed");
        }
        fixes.push(FileFix {
            path: rel.clone(),
            categories: tx.categories(),
            diff,
            applied: write,
        });
    }

    for (_, proposal) in proposals {
        let mut finding = proposal.finding;
        finding.fixed = write && proposal.fix.is_automatic();
        findings.push(finding);
    }
    if options.strict {
        findings.iter_mut().for_each(Finding::promote);
    }
    findings.sort();

    let report = RunReport {
        mode: options.mode,
        strict: options.strict,
        findings,
        fixes,
        scan: scan.stats,
        model: model.stats(),
    };
    let counts = report.counts();
    info!(
        fatal = counts.fatal,
        advisory = counts.advisory,
        fixed = counts.fixed,
        files_edited = report.fixes.len(),
        "check complete"
    );
    Ok(report)
}

/// Merge every automatic fix into one transaction per file.
fn plan(
    model: &Model,
    proposals: &[(Analysis, Proposal)],
) -> (BTreeMap<String, Transaction>, BTreeSet<Analysis>) {
    let mut transactions: BTreeMap<String, Transaction> = BTreeMap::new();
    let mut contributing = BTreeSet::new();
    for (analysis, proposal) in proposals {
        let file = &proposal.finding.file;
        let Some(record) = model.record(file) else {
            continue;
        };
        let tx = || Transaction::new(file, &record.text);
        match &proposal.fix {
            Fix::Edit(edit) => {
                transactions.entry(file.clone()).or_insert_with(tx).push(edit.clone());
            }
            Fix::NormalizeLineEndings => {
                transactions
                    .entry(file.clone())
                    .or_insert_with(tx)
                    .normalize_line_endings();
            }
            Fix::Shared | Fix::Manual => continue,
        }
        contributing.insert(*analysis);
    }
    (transactions, contributing)
}

/// Re-index the edited texts, rebuild the model and re-run every analysis
/// that contributed edits. Anything it still wants to change means the fix
/// did not converge.
fn reverify(
    model: &Model,
    texts: &BTreeMap<String, String>,
    contributing: &BTreeSet<Analysis>,
    strict: bool,
) -> Result<()> {
    let ctx = IndexContext::from_config(&model.config);
    let mut records = Vec::with_capacity(model.records.len());
    for record in &model.records {
        match texts.get(&record.rel_path) {
            Some(text) => {
                let reindexed = index_source(&record.path, &record.rel_path, text, &ctx)
                    .map_err(|e| TetherError::Consistency {
                        path: record.rel_path.clone(),
                        category: Category::ParseError.to_string(),
                        detail: e.to_string(),
                    })?;
                records.push(reindexed);
            }
            None => records.push(record.clone()),
        }
    }

    let after =
        Model::build_with_unparsed(records, model.unparsed.clone(), &model.root, &model.config);
    for analysis in contributing {
        if let Some(stale) = analysis
            .run(&after, strict)
            .into_iter()
            .find(|p| p.fix.is_automatic())
        {
            warn!(file = %stale.finding.file, analysis = %analysis, "fix did not converge");
            return Err(TetherError::Consistency {
                path: stale.finding.file,
                category: stale.finding.category.to_string(),
                detail: stale.finding.message,
            });
        }
    }
    debug!(files = texts.len(), "edits reverified");
    Ok(())
}

fn parse_error_line(err: &ParseError) -> Option<usize> {
    match err {
        ParseError::InvalidUtf8 => None,
        ParseError::Binary { line } => Some(*line),
        ParseError::DuplicateManifest { second, .. } => Some(*second),
        ParseError::UnclosedFunction { line, .. } => Some(*line),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn corpus(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (rel, text) in files {
            let path = dir.path().join(rel);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, text).unwrap();
        }
        dir
    }

    #[test]
    fn test_report_only_writes_nothing() {
        let dir = corpus(&[("run.sh", "#!/bin/bash\nfoo() { :; }\nfoo\n")]);
        let report = run(&CheckOptions::new(dir.path())).unwrap();
        assert_eq!(report.fixes.len(), 1);
        assert!(!report.fixes[0].applied);
        assert!(report.fixes[0].diff.contains("+# Function Index:"));
        assert_eq!(
            fs::read_to_string(dir.path().join("run.sh")).unwrap(),
            "#!/bin/bash\nfoo() { :; }\nfoo\n"
        );
    }

    #[test]
    fn test_fix_mode_writes_and_marks_fixed() {
        let dir = corpus(&[("run.sh", "#!/bin/bash\nfoo() { :; }\nfoo\n")]);
        let options = CheckOptions::new(dir.path())
            .with_mode(Mode::Fix)
            .with_analyses(AnalysisSet::only([Analysis::FunctionIndex]));
        let report = run(&options).unwrap();
        assert!(report.fixes[0].applied);
        assert!(report
            .findings
            .iter()
            .filter(|f| f.category == Category::FunctionIndex)
            .all(|f| f.fixed));
        assert_eq!(
            fs::read_to_string(dir.path().join("run.sh")).unwrap(),
            "#!/bin/bash\n# Function Index:\n#   - foo\n#\nfoo() { :; }\nfoo\n"
        );
    }

    #[test]
    fn test_broken_include_is_reported_once() {
        let dir = corpus(&[
            ("lib.sh", "helper() {\n  echo never closed\n"),
            ("entry.sh", "#!/bin/bash\nsource ./lib.sh\necho go\n"),
        ]);
        let report = run(&CheckOptions::new(dir.path())).unwrap();
        let fatal: Vec<&Finding> = report.blocking().collect();
        assert_eq!(fatal.len(), 1);
        assert_eq!(fatal[0].category, Category::ParseError);
        assert_eq!(fatal[0].file, "lib.sh");
        assert!(report
            .findings
            .iter()
            .any(|f| f.file == "entry.sh" && f.message.contains("failed to parse")));
    }

    #[test]
    fn test_parse_errors_are_fatal_findings() {
        let dir = corpus(&[("bad.sh", "f() {\n  echo\n"), ("ok.sh", "echo ok\n")]);
        let report = run(&CheckOptions::new(dir.path())).unwrap();
        let fatal: Vec<&Finding> = report.blocking().collect();
        assert_eq!(fatal.len(), 1);
        assert_eq!(fatal[0].category, Category::ParseError);
        assert_eq!(fatal[0].file, "bad.sh");
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn test_strict_promotes_advisories() {
        let dir = corpus(&[("run.sh", "#!/bin/bash\necho hi\n")]);
        let relaxed = run(&CheckOptions::new(dir.path())).unwrap();
        assert_eq!(relaxed.exit_code(), 0);
        assert!(relaxed.counts().advisory > 0);
        let strict = run(&CheckOptions::new(dir.path()).with_strict(true)).unwrap();
        assert_eq!(strict.exit_code(), 1);
    }

    #[test]
    fn test_invalid_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(&CheckOptions::new(dir.path().join("missing"))).unwrap_err();
        assert!(matches!(err, TetherError::InvalidRoot(_)));
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let dir = corpus(&[("run.sh", "echo\n")]);
        let options = CheckOptions::new(dir.path())
            .with_config(ConfigSource::File(dir.path().join("absent.toml")));
        assert!(matches!(run(&options), Err(TetherError::Config(_))));
    }

    #[test]
    fn test_self_check_passes() {
        let mut config = TetherConfig::default();
        config.engine.self_check = true;
        let dir = corpus(&[
            ("a.sh", "source ./b.sh\nf\n"),
            ("b.sh", "f() { :; }\n"),
        ]);
        let options = CheckOptions::new(dir.path()).with_config(ConfigSource::Inline(config));
        assert!(run(&options).is_ok());
    }
}
