//! The model engine for Tether.
//!
//! Holds the indexed records, the module (include) graph and the function
//! call graph, both stored in petgraph. Built once per run and shared
//! read-only by every analysis.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::types::*;
use crate::analysis::reachability;
use crate::config::TetherConfig;
use crate::error::{Result, TetherError};
use crate::finding::{Category, Finding, Severity};

/// Builtins and common utilities that are never "unresolved".
const KNOWN_COMMANDS: &[&str] = &[
    // builtins
    "alias", "bg", "bind", "break", "builtin", "caller", "cd", "command", "compgen", "complete",
    "continue", "declare", "dirs", "disown", "echo", "enable", "eval", "exec", "exit", "export",
    "false", "fc", "fg", "getopts", "hash", "help", "history", "jobs", "kill", "let", "local",
    "logout", "mapfile", "popd", "printf", "pushd", "pwd", "read", "readarray", "readonly",
    "return", "set", "shift", "shopt", "source", "suspend", "test", "times", "trap", "true",
    "type", "typeset", "ulimit", "umask", "unalias", "unset", "wait",
    // coreutils and friends
    "awk", "base64", "basename", "bash", "cat", "chmod", "chown", "cp", "curl", "cut", "date",
    "dd", "df", "diff", "dirname", "du", "env", "find", "grep", "gzip", "head", "hostname", "id",
    "install", "ip", "jq", "ln", "logger", "ls", "mkdir", "mktemp", "mount", "mv", "nc", "nohup",
    "ping", "ps", "readlink", "realpath", "rm", "rmdir", "rsync", "scp", "sed", "seq", "sh",
    "sleep", "sort", "ssh", "stat", "sudo", "sync", "systemctl", "tail", "tar", "tee", "timeout",
    "touch", "tr", "umount", "uname", "uniq", "wc", "wget", "which", "whoami", "xargs", "yes",
];

// ─── Module Graph ─────────────────────────────────────────────────────────────

/// Files and the includes between them.
#[derive(Debug, Clone, Default)]
pub struct ModuleGraph {
    graph: DiGraph<NodeData, EdgeData>,
    file_index: HashMap<String, NodeIndex>,
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file node. Returns the existing node if already present.
    pub fn add_file(&mut self, rel_path: &str) -> NodeIndex {
        if let Some(&idx) = self.file_index.get(rel_path) {
            return idx;
        }
        let idx = self.graph.add_node(NodeData::new_file(rel_path));
        self.file_index.insert(rel_path.to_string(), idx);
        idx
    }

    pub fn add_include(&mut self, from: &str, to: &str, line: usize) {
        let from = self.add_file(from);
        let to = self.add_file(to);
        self.graph
            .add_edge(from, to, EdgeData::new(EdgeKind::Includes, line));
    }

    pub fn node(&self, rel_path: &str) -> Option<NodeIndex> {
        self.file_index.get(rel_path).copied()
    }

    pub fn file(&self, idx: NodeIndex) -> &str {
        &self.graph[idx].file
    }

    /// All files, sorted.
    pub fn files(&self) -> Vec<&str> {
        let mut files: Vec<&str> = self.file_index.keys().map(|s| s.as_str()).collect();
        files.sort_unstable();
        files
    }

    /// Direct successors of `idx`, sorted by path, de-duplicated.
    pub fn successors(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.neighbors_sorted(idx, Direction::Outgoing)
    }

    fn neighbors_sorted(&self, idx: NodeIndex, dir: Direction) -> Vec<NodeIndex> {
        let mut out: Vec<NodeIndex> = self.graph.neighbors_directed(idx, dir).collect();
        out.sort_by(|a, b| self.graph[*a].file.cmp(&self.graph[*b].file));
        out.dedup();
        out
    }

    /// Files `rel_path` includes directly.
    pub fn includes(&self, rel_path: &str) -> Vec<&str> {
        self.node(rel_path)
            .map(|idx| {
                self.neighbors_sorted(idx, Direction::Outgoing)
                    .into_iter()
                    .map(|n| self.file(n))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Files that include `rel_path` directly.
    pub fn includers(&self, rel_path: &str) -> Vec<&str> {
        self.node(rel_path)
            .map(|idx| {
                self.neighbors_sorted(idx, Direction::Incoming)
                    .into_iter()
                    .map(|n| self.file(n))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Transitive includes of `rel_path`. Contains `rel_path` itself only
    /// when it sits on a cycle.
    pub fn closure(&self, rel_path: &str) -> BTreeSet<String> {
        self.reach(rel_path, Direction::Outgoing)
    }

    /// Transitive includers of `rel_path`.
    pub fn ancestors(&self, rel_path: &str) -> BTreeSet<String> {
        self.reach(rel_path, Direction::Incoming)
    }

    fn reach(&self, rel_path: &str, dir: Direction) -> BTreeSet<String> {
        let mut seen = BTreeSet::new();
        let Some(start) = self.node(rel_path) else {
            return seen;
        };
        let mut queue = VecDeque::from([start]);
        while let Some(idx) = queue.pop_front() {
            for next in self.neighbors_sorted(idx, dir) {
                if seen.insert(self.file(next).to_string()) {
                    queue.push_back(next);
                }
            }
        }
        seen
    }

    /// `(from, to, line)` for every include edge, sorted.
    pub fn edges(&self) -> Vec<(String, String, usize)> {
        let mut edges: Vec<_> = self
            .graph
            .edge_references()
            .map(|e| {
                (
                    self.file(e.source()).to_string(),
                    self.file(e.target()).to_string(),
                    e.weight().line,
                )
            })
            .collect();
        edges.sort();
        edges
    }

    pub fn has_self_loop(&self, idx: NodeIndex) -> bool {
        self.graph.find_edge(idx, idx).is_some()
    }

    pub fn inner(&self) -> &DiGraph<NodeData, EdgeData> {
        &self.graph
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

// ─── Call Graph ───────────────────────────────────────────────────────────────

/// Top-level pseudo-nodes, authoritative function definitions and the calls
/// between them.
#[derive(Debug, Clone, Default)]
pub struct CallGraph {
    graph: DiGraph<NodeData, EdgeData>,
    top_index: HashMap<String, NodeIndex>,
    fn_index: HashMap<(String, String), NodeIndex>,
    /// Function name -> files holding its authoritative definition (sorted).
    definitions: BTreeMap<String, Vec<String>>,
}

impl CallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_top_level(&mut self, file: &str) -> NodeIndex {
        if let Some(&idx) = self.top_index.get(file) {
            return idx;
        }
        let idx = self.graph.add_node(NodeData::new_top_level(file));
        self.top_index.insert(file.to_string(), idx);
        idx
    }

    pub fn add_function(&mut self, file: &str, name: &str, line: usize) -> NodeIndex {
        let key = (file.to_string(), name.to_string());
        if let Some(&idx) = self.fn_index.get(&key) {
            return idx;
        }
        let idx = self.graph.add_node(NodeData::new_function(file, name, line));
        self.fn_index.insert(key, idx);
        let files = self.definitions.entry(name.to_string()).or_default();
        files.push(file.to_string());
        files.sort();
        idx
    }

    pub fn add_call(&mut self, from: NodeIndex, to: NodeIndex, kind: EdgeKind, line: usize) {
        self.graph.add_edge(from, to, EdgeData::new(kind, line));
    }

    pub fn top_level(&self, file: &str) -> Option<NodeIndex> {
        self.top_index.get(file).copied()
    }

    pub fn function(&self, file: &str, name: &str) -> Option<NodeIndex> {
        self.fn_index
            .get(&(file.to_string(), name.to_string()))
            .copied()
    }

    pub fn node(&self, idx: NodeIndex) -> &NodeData {
        &self.graph[idx]
    }

    /// Files defining `name`, sorted.
    pub fn definers(&self, name: &str) -> &[String] {
        self.definitions
            .get(name)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Callees of `idx`, sorted by label.
    pub fn successors(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut out: Vec<NodeIndex> = self.graph.neighbors(idx).collect();
        out.sort_by_key(|n| self.graph[*n].label());
        out.dedup();
        out
    }

    /// `(from, to, kind, line)` for every call edge, sorted.
    pub fn edges(&self) -> Vec<(String, String, EdgeKind, usize)> {
        let mut edges: Vec<_> = self
            .graph
            .edge_references()
            .map(|e| {
                (
                    self.graph[e.source()].label(),
                    self.graph[e.target()].label(),
                    e.weight().kind,
                    e.weight().line,
                )
            })
            .collect();
        edges.sort();
        edges
    }

    pub fn inner(&self) -> &DiGraph<NodeData, EdgeData> {
        &self.graph
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

// ─── Resolution ───────────────────────────────────────────────────────────────

/// How a call site was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Defined in the calling file.
    Local,
    /// Uniquely defined in the caller's transitive includes.
    Included,
    /// Uniquely defined elsewhere in the corpus, not included.
    Corpus,
    /// Defined in several files.
    Ambiguous,
    /// A builtin or known command.
    External,
    /// Listed in `calls.ignored`.
    Ignored,
    Unresolved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallResolution {
    pub file: String,
    pub line: usize,
    pub callee: String,
    pub caller: Option<String>,
    pub kind: CallKind,
    pub resolution: Resolution,
    /// Files whose definition the call may reach, sorted.
    pub targets: Vec<String>,
}

/// Where an include statement landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum IncludeResolution {
    /// An indexed file.
    File(String),
    /// Outside the scanned root.
    External(String),
    /// Inside the root but not indexed.
    Dangling(String),
    /// In the corpus but skipped because it failed to parse.
    Unparsed(String),
    /// Not statically resolvable.
    Unresolved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedInclude {
    pub file: String,
    pub line: usize,
    pub resolution: IncludeResolution,
}

// ─── Model ────────────────────────────────────────────────────────────────────

/// Everything an analysis may look at. Immutable once built.
#[derive(Debug, Clone)]
pub struct Model {
    pub root: PathBuf,
    pub config: TetherConfig,
    /// Indexed scripts, sorted by `rel_path`.
    pub records: Vec<ScriptRecord>,
    pub modules: ModuleGraph,
    pub calls: CallGraph,
    /// One entry per call site, in (file, line) order.
    pub resolutions: Vec<CallResolution>,
    /// One entry per include statement, in (file, line) order.
    pub includes: Vec<ResolvedInclude>,
    /// Resolution findings (dangling includes, unresolved calls, ...).
    pub findings: Vec<Finding>,
    /// Files found by the scan that failed to parse.
    pub unparsed: BTreeSet<String>,
    roles: BTreeMap<String, Role>,
    record_index: HashMap<String, usize>,
}

impl Model {
    /// Build the model. Input order does not matter.
    pub fn build(records: Vec<ScriptRecord>, root: &Path, config: &TetherConfig) -> Self {
        Self::build_with_unparsed(records, BTreeSet::new(), root, config)
    }

    /// Build the model, knowing which scanned files were dropped as
    /// unparseable. Includes of those are not reported as missing.
    pub fn build_with_unparsed(
        mut records: Vec<ScriptRecord>,
        unparsed: BTreeSet<String>,
        root: &Path,
        config: &TetherConfig,
    ) -> Self {
        records.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
        records.dedup_by(|a, b| a.rel_path == b.rel_path);
        let record_index: HashMap<String, usize> = records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.rel_path.clone(), i))
            .collect();

        let mut model = Self {
            root: root.to_path_buf(),
            config: config.clone(),
            records: Vec::new(),
            modules: ModuleGraph::new(),
            calls: CallGraph::new(),
            resolutions: Vec::new(),
            includes: Vec::new(),
            findings: Vec::new(),
            unparsed,
            roles: BTreeMap::new(),
            record_index,
        };

        model.build_modules(&records);
        model.records = records;
        model.build_calls();
        model.roles = reachability::classify(&model);

        info!(
            files = model.records.len(),
            includes = model.modules.edge_count(),
            functions = model.calls.node_count() - model.records.len(),
            calls = model.calls.edge_count(),
            "model built"
        );
        model
    }

    fn build_modules(&mut self, records: &[ScriptRecord]) {
        for record in records {
            self.modules.add_file(&record.rel_path);
        }
        for record in records {
            for inc in &record.includes {
                let resolution = self.resolve_include(record, &inc.target);
                match &resolution {
                    IncludeResolution::File(target) => {
                        self.modules.add_include(&record.rel_path, target, inc.line);
                    }
                    IncludeResolution::External(path) => {
                        debug!(file = %record.rel_path, line = inc.line, target = %path, "external include ignored");
                    }
                    IncludeResolution::Dangling(path) => {
                        self.findings.push(Finding::new(
                            Category::DanglingInclude,
                            &record.rel_path,
                            Some(inc.line),
                            format!("included file `{}` does not exist in the corpus", path),
                        ));
                    }
                    IncludeResolution::Unparsed(path) => {
                        self.findings.push(Finding::new(
                            Category::IncludeNeedsReview,
                            &record.rel_path,
                            Some(inc.line),
                            format!(
                                "included file `{}` failed to parse; its definitions are unknown",
                                path
                            ),
                        ));
                    }
                    IncludeResolution::Unresolved => {
                        self.findings.push(Finding::new(
                            Category::IncludeNeedsReview,
                            &record.rel_path,
                            Some(inc.line),
                            format!("include target `{}` cannot be resolved statically", inc.raw),
                        ));
                    }
                }
                self.includes.push(ResolvedInclude {
                    file: record.rel_path.clone(),
                    line: inc.line,
                    resolution,
                });
            }

            for def in record.functions.iter().filter(|f| f.shadowed) {
                let winner = record
                    .functions
                    .iter()
                    .rev()
                    .find(|f| f.name == def.name && !f.shadowed)
                    .map_or(0, |f| f.line_start);
                self.findings.push(Finding::new(
                    Category::ShadowedDefinition,
                    &record.rel_path,
                    Some(def.line_start),
                    format!(
                        "`{}` is redefined on line {}; this definition is never used",
                        def.name, winner
                    ),
                ));
            }
        }
    }

    fn resolve_include(&self, record: &ScriptRecord, target: &IncludeTarget) -> IncludeResolution {
        let candidate = match target {
            IncludeTarget::Unresolved(_) => return IncludeResolution::Unresolved,
            IncludeTarget::Module(name) => {
                match normalize(&self.config.includes.library_dir, name) {
                    Some(path) => path,
                    None => return IncludeResolution::External(name.clone()),
                }
            }
            IncludeTarget::Path(path) if path.starts_with('/') => {
                match Path::new(path).strip_prefix(&self.root) {
                    Ok(inside) => match normalize("", &inside.to_string_lossy()) {
                        Some(p) => p,
                        None => return IncludeResolution::External(path.clone()),
                    },
                    Err(_) => return IncludeResolution::External(path.clone()),
                }
            }
            IncludeTarget::Path(path) => match normalize(parent_dir(&record.rel_path), path) {
                Some(p) => p,
                None => return IncludeResolution::External(path.clone()),
            },
        };
        if self.record_index.contains_key(&candidate) {
            IncludeResolution::File(candidate)
        } else if self.unparsed.contains(&candidate) {
            IncludeResolution::Unparsed(candidate)
        } else {
            IncludeResolution::Dangling(candidate)
        }
    }

    fn build_calls(&mut self) {
        for record in &self.records {
            self.calls.add_top_level(&record.rel_path);
        }
        for record in &self.records {
            for def in record.authoritative_functions() {
                self.calls
                    .add_function(&record.rel_path, &def.name, def.line_start);
            }
        }

        let mut resolutions = Vec::new();
        let mut findings = Vec::new();
        for record in &self.records {
            let closure = self.modules.closure(&record.rel_path);
            for call in &record.calls {
                let resolution = self.resolve_call(record, call, &closure);
                // A redefined function's body never runs; its calls add no edges.
                let from = match (&call.caller, call.caller_line) {
                    (Some(_), Some(line)) if record.is_shadowed_at(line) => None,
                    (Some(name), _) => self.calls.function(&record.rel_path, name),
                    (None, _) => self.calls.top_level(&record.rel_path),
                };
                let edge_kind = match call.kind {
                    CallKind::Command => EdgeKind::Calls,
                    CallKind::Trap => EdgeKind::Handles,
                };
                if let Some(from) = from {
                    for target in &resolution.targets {
                        if let Some(to) = self.calls.function(target, &call.callee) {
                            self.calls.add_call(from, to, edge_kind, call.line);
                        }
                    }
                }
                if let Some(finding) = resolution_finding(&resolution) {
                    findings.push(finding);
                }
                resolutions.push(resolution);
            }
        }
        self.resolutions = resolutions;
        self.findings.extend(findings);
    }

    fn resolve_call(
        &self,
        record: &ScriptRecord,
        call: &CallSite,
        closure: &BTreeSet<String>,
    ) -> CallResolution {
        let (resolution, targets) = if self.config.calls.ignored.contains(&call.callee) {
            (Resolution::Ignored, Vec::new())
        } else if record.defines(&call.callee) {
            (Resolution::Local, vec![record.rel_path.clone()])
        } else {
            let definers = self.calls.definers(&call.callee);
            let included: Vec<String> = definers
                .iter()
                .filter(|f| closure.contains(*f))
                .cloned()
                .collect();
            if included.len() == 1 {
                (Resolution::Included, included)
            } else {
                match definers.len() {
                    0 if self.is_known_command(&call.callee) => (Resolution::External, Vec::new()),
                    0 => (Resolution::Unresolved, Vec::new()),
                    1 => (Resolution::Corpus, definers.to_vec()),
                    _ => (Resolution::Ambiguous, definers.to_vec()),
                }
            }
        };
        CallResolution {
            file: record.rel_path.clone(),
            line: call.line,
            callee: call.callee.clone(),
            caller: call.caller.clone(),
            kind: call.kind,
            resolution,
            targets,
        }
    }

    fn is_known_command(&self, name: &str) -> bool {
        KNOWN_COMMANDS.contains(&name)
            || self.config.calls.external_commands.iter().any(|c| c == name)
    }

    // ─── Lookups ──────────────────────────────────────────────────────────

    pub fn record(&self, rel_path: &str) -> Option<&ScriptRecord> {
        self.record_index.get(rel_path).map(|&i| &self.records[i])
    }

    pub fn role(&self, rel_path: &str) -> Role {
        self.roles.get(rel_path).copied().unwrap_or(Role::Unknown)
    }

    pub fn roles(&self) -> &BTreeMap<String, Role> {
        &self.roles
    }

    /// Resolved target of the include on `line` of `file`.
    pub fn include_target(&self, file: &str, line: usize) -> Option<&str> {
        self.includes
            .iter()
            .find(|i| i.file == file && i.line == line)
            .and_then(|i| match &i.resolution {
                IncludeResolution::File(target) => Some(target.as_str()),
                _ => None,
            })
    }

    pub fn resolutions_for<'a>(&'a self, file: &'a str) -> impl Iterator<Item = &'a CallResolution> {
        self.resolutions.iter().filter(move |r| r.file == file)
    }

    /// True when some file builds command names at runtime or uses `eval`.
    pub fn has_dynamic_dispatch(&self) -> bool {
        self.records.iter().any(|r| !r.dynamic_calls.is_empty())
    }

    // ─── Snapshot & Stats ─────────────────────────────────────────────────

    /// Canonical, order-independent view of the model.
    pub fn snapshot(&self) -> ModelSnapshot {
        let files = self
            .records
            .iter()
            .map(|r| FileSnapshot {
                path: r.rel_path.clone(),
                role: self.role(&r.rel_path),
                top_level_code: r.top_level_code,
                functions: r
                    .functions
                    .iter()
                    .map(|f| (f.name.clone(), f.line_start, f.line_end, f.shadowed))
                    .collect(),
                includes: self
                    .includes
                    .iter()
                    .filter(|i| i.file == r.rel_path)
                    .map(|i| (i.line, i.resolution.clone()))
                    .collect(),
                manifest: r.header.manifest.as_ref().map(|m| m.entries.clone()),
            })
            .collect();
        let mut findings = self.findings.clone();
        findings.sort();
        ModelSnapshot {
            files,
            module_edges: self.modules.edges(),
            call_edges: self.calls.edges(),
            findings,
        }
    }

    pub fn snapshot_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.snapshot())
            .map_err(|e| TetherError::Defect(format!("snapshot serialization failed: {}", e)))
    }

    pub fn stats(&self) -> ModelStats {
        let count_role = |role| self.roles.values().filter(|r| **r == role).count();
        ModelStats {
            files: self.records.len(),
            entries: count_role(Role::Entry),
            libraries: count_role(Role::Library),
            ambiguous: count_role(Role::Ambiguous),
            functions: self.records.iter().map(|r| r.functions.len()).sum(),
            includes: self.records.iter().map(|r| r.includes.len()).sum(),
            module_edges: self.modules.edge_count(),
            call_sites: self.resolutions.len(),
            call_edges: self.calls.edge_count(),
        }
    }
}

fn resolution_finding(res: &CallResolution) -> Option<Finding> {
    match res.resolution {
        Resolution::Ambiguous => Some(Finding::new(
            Category::AmbiguousCall,
            &res.file,
            Some(res.line),
            format!(
                "call to `{}` is ambiguous: defined in {}",
                res.callee,
                res.targets.join(", ")
            ),
        )),
        Resolution::Unresolved => {
            // Only names following the `__name__` library convention are
            // worth an advisory; anything else is most likely a program.
            let severity = if looks_like_library_function(&res.callee) {
                Severity::Advisory
            } else {
                Severity::Info
            };
            Some(
                Finding::new(
                    Category::UnresolvedCall,
                    &res.file,
                    Some(res.line),
                    format!(
                        "`{}` is not defined in the corpus and is not a known command",
                        res.callee
                    ),
                )
                .with_severity(severity),
            )
        }
        _ => None,
    }
}

fn looks_like_library_function(name: &str) -> bool {
    name.len() > 4 && name.starts_with("__") && name.ends_with("__")
}

/// Directory part of a root-relative path (`""` for top-level files).
pub fn parent_dir(rel_path: &str) -> &str {
    rel_path.rsplit_once('/').map_or("", |(dir, _)| dir)
}

/// Join `rel` onto `base` and resolve `.` / `..` lexically. `None` when
/// the result escapes the root.
pub fn normalize(base: &str, rel: &str) -> Option<String> {
    let mut parts: Vec<&str> = base.split('/').filter(|s| !s.is_empty()).collect();
    for seg in rel.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            s => parts.push(s),
        }
    }
    Some(parts.join("/"))
}

// ─── Snapshot Types ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSnapshot {
    pub path: String,
    pub role: Role,
    pub top_level_code: bool,
    /// `(name, line_start, line_end, shadowed)`
    pub functions: Vec<(String, usize, usize, bool)>,
    pub includes: Vec<(usize, IncludeResolution)>,
    pub manifest: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub files: Vec<FileSnapshot>,
    pub module_edges: Vec<(String, String, usize)>,
    pub call_edges: Vec<(String, String, EdgeKind, usize)>,
    pub findings: Vec<Finding>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelStats {
    pub files: usize,
    pub entries: usize,
    pub libraries: usize,
    pub ambiguous: usize,
    pub functions: usize,
    pub includes: usize,
    pub module_edges: usize,
    pub call_sites: usize,
    pub call_edges: usize,
}

impl fmt::Display for ModelStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} scripts ({} entry, {} library, {} ambiguous), {} functions, {} includes ({} resolved), {} call sites ({} graph edges)",
            self.files,
            self.entries,
            self.libraries,
            self.ambiguous,
            self.functions,
            self.includes,
            self.module_edges,
            self.call_sites,
            self.call_edges
        )
    }
}
