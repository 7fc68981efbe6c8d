//! Entry/library classification and dead-code detection.
//!
//! Reachability is a BFS over the call graph seeded from the top-level
//! node of every entry script. Sourcing a file runs its top level, so
//! reaching any node in a file activates that file and everything it
//! includes.

use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::fmt;
use tracing::debug;

use super::Proposal;
use crate::finding::{Category, Finding, Severity};
use crate::graph::{Model, Role};

/// Classify every script. Priority: explicit `main` call, then include
/// status combined with top-level code.
pub fn classify(model: &Model) -> BTreeMap<String, Role> {
    let mains = &model.config.entry.main_functions;
    model
        .records
        .iter()
        .map(|record| {
            let calls_main = record.calls.iter().any(|c| {
                c.caller.is_none() && mains.contains(&c.callee) && record.defines(&c.callee)
            });
            let included = !model.modules.includers(&record.rel_path).is_empty();
            let role = if calls_main {
                Role::Entry
            } else {
                match (included, record.top_level_code) {
                    (false, true) => Role::Entry,
                    (false, false) | (true, false) => Role::Library,
                    (true, true) => Role::Ambiguous,
                }
            };
            (record.rel_path.clone(), role)
        })
        .collect()
}

/// Why a dead-code candidate might still be live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Caveat {
    /// The corpus builds command names at runtime or uses `eval`.
    DynamicDispatch,
    /// The name appears as an argument word somewhere.
    PossibleCallback,
    /// The defining file is neither clearly an entry nor a library.
    AmbiguousFile,
}

impl fmt::Display for Caveat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Caveat::DynamicDispatch => write!(f, "dynamic-dispatch"),
            Caveat::PossibleCallback => write!(f, "possible-callback"),
            Caveat::AmbiguousFile => write!(f, "ambiguous-file"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadFunction {
    pub file: String,
    pub name: String,
    pub line: usize,
    pub caveats: Vec<Caveat>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreachedGlobal {
    pub file: String,
    pub name: String,
    pub line: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReachabilityReport {
    /// `(file, function)` pairs reached from some entry.
    pub reached: BTreeSet<(String, String)>,
    pub activated: BTreeSet<String>,
    pub dead_functions: Vec<DeadFunction>,
    pub unreached_globals: Vec<UnreachedGlobal>,
}

pub fn analyze(model: &Model) -> ReachabilityReport {
    let calls = &model.calls;
    let mut visited: HashSet<NodeIndex> = HashSet::new();
    let mut activated: BTreeSet<String> = BTreeSet::new();
    let mut queue: VecDeque<NodeIndex> = VecDeque::new();

    for record in &model.records {
        if model.role(&record.rel_path) == Role::Entry {
            if let Some(top) = calls.top_level(&record.rel_path) {
                if visited.insert(top) {
                    queue.push_back(top);
                }
            }
        }
    }

    while let Some(node) = queue.pop_front() {
        let file = calls.node(node).file.clone();
        if activated.insert(file.clone()) {
            let mut newly = vec![file.clone()];
            for inc in model.modules.closure(&file) {
                if activated.insert(inc.clone()) {
                    newly.push(inc);
                }
            }
            for f in newly {
                if let Some(top) = calls.top_level(&f) {
                    if visited.insert(top) {
                        queue.push_back(top);
                    }
                }
            }
        }
        for next in calls.successors(node) {
            if visited.insert(next) {
                queue.push_back(next);
            }
        }
    }

    let reached: BTreeSet<(String, String)> = visited
        .iter()
        .map(|idx| calls.node(*idx))
        .filter(|n| !n.name.is_empty())
        .map(|n| (n.file.clone(), n.name.clone()))
        .collect();

    let dynamic = model.has_dynamic_dispatch();
    let markers: Vec<String> = model
        .config
        .dead_code
        .reserved_markers
        .iter()
        .map(|m| m.to_lowercase())
        .collect();

    let mut dead_functions = Vec::new();
    for record in &model.records {
        for def in record.authoritative_functions() {
            if reached.contains(&(record.rel_path.clone(), def.name.clone())) {
                continue;
            }
            let reserved = def.doc.as_ref().is_some_and(|doc| {
                let doc = doc.to_lowercase();
                markers.iter().any(|m| doc.contains(m.as_str()))
            });
            if reserved {
                continue;
            }
            let mut caveats = Vec::new();
            if dynamic {
                caveats.push(Caveat::DynamicDispatch);
            }
            if model
                .records
                .iter()
                .any(|r| r.arg_words.binary_search(&def.name).is_ok())
            {
                caveats.push(Caveat::PossibleCallback);
            }
            if model.role(&record.rel_path) == Role::Ambiguous {
                caveats.push(Caveat::AmbiguousFile);
            }
            dead_functions.push(DeadFunction {
                file: record.rel_path.clone(),
                name: def.name.clone(),
                line: def.line_start,
                caveats,
            });
        }
    }

    let unreached_globals = unreached_globals(model, &reached, &activated);
    debug!(
        reached = reached.len(),
        activated = activated.len(),
        dead = dead_functions.len(),
        "reachability done"
    );

    ReachabilityReport {
        reached,
        activated,
        dead_functions,
        unreached_globals,
    }
}

/// Globals never expanded at the top level of an activated file or inside
/// a reached function.
fn unreached_globals(
    model: &Model,
    reached: &BTreeSet<(String, String)>,
    activated: &BTreeSet<String>,
) -> Vec<UnreachedGlobal> {
    let mut live: HashSet<&str> = HashSet::new();
    for record in &model.records {
        let file_active = activated.contains(&record.rel_path);
        for var in &record.var_refs {
            let counts = match record.function_at(var.line) {
                Some(def) if def.shadowed => false,
                Some(def) => reached.contains(&(record.rel_path.clone(), def.name.clone())),
                None => file_active,
            };
            if counts {
                live.insert(var.name.as_str());
            }
        }
    }

    let ignored = &model.config.dead_code.ignored_globals;
    model
        .records
        .iter()
        .flat_map(|record| {
            record
                .globals
                .iter()
                .filter(|g| !g.exported && !ignored.contains(&g.name))
                .filter(|g| !live.contains(g.name.as_str()))
                .map(|g| UnreachedGlobal {
                    file: record.rel_path.clone(),
                    name: g.name.clone(),
                    line: g.line,
                })
        })
        .collect()
}

pub fn run(model: &Model) -> Vec<Proposal> {
    let report = analyze(model);
    let mut proposals = Vec::new();
    for dead in &report.dead_functions {
        let mut message = format!("function `{}` is never reached from an entry point", dead.name);
        let finding = if dead.caveats.is_empty() {
            Finding::new(Category::DeadFunction, &dead.file, Some(dead.line), message)
        } else {
            let caveats: Vec<String> = dead.caveats.iter().map(|c| c.to_string()).collect();
            message.push_str(&format!(" (caveats: {})", caveats.join(", ")));
            Finding::new(Category::DeadFunction, &dead.file, Some(dead.line), message)
                .with_severity(Severity::Info)
        };
        proposals.push(Proposal::manual(finding));
    }
    for global in &report.unreached_globals {
        proposals.push(Proposal::manual(Finding::new(
            Category::UnreachedGlobal,
            &global.file,
            Some(global.line),
            format!("global `{}` is set but never read by reachable code", global.name),
        )));
    }
    proposals
}
