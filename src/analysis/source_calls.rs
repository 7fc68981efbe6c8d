//! Call-to-source consistency for entry scripts.
//!
//! An entry script that calls a library function must source the module
//! defining it, and should not source modules it never uses. Only entry
//! scripts nobody includes are checked: adding or removing an include
//! there cannot change what any other file sees.

use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use super::{Fix, Proposal};
use crate::finding::{Category, Finding};
use crate::fix::LineEdit;
use crate::graph::types::ScriptRecord;
use crate::graph::{Model, Resolution, Role};

/// A library module an entry script calls into without sourcing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingInclude {
    /// Root-relative path of the defining module.
    pub target: String,
    /// First call that needs it.
    pub callee: String,
    pub line: usize,
}

/// A standalone include statement nothing depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnusedInclude {
    pub target: String,
    pub line: usize,
    pub statement: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncludePlan {
    pub missing: Vec<MissingInclude>,
    pub unused: Vec<UnusedInclude>,
    /// Calls into files outside the library directory that are never sourced.
    pub unsourced: Vec<MissingInclude>,
}

impl IncludePlan {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.unused.is_empty() && self.unsourced.is_empty()
    }
}

/// Whether `rel_path` is checked at all.
fn is_checked(model: &Model, rel_path: &str) -> bool {
    model.role(rel_path) == Role::Entry && model.modules.includers(rel_path).is_empty()
}

pub fn plan(model: &Model, record: &ScriptRecord) -> IncludePlan {
    let mut plan = IncludePlan::default();
    if !is_checked(model, &record.rel_path) {
        return plan;
    }

    let library = model.config.includes.library_dir.trim_matches('/');
    let mut needed: BTreeMap<String, MissingInclude> = BTreeMap::new();
    let mut elsewhere: BTreeMap<String, MissingInclude> = BTreeMap::new();
    for res in model.resolutions_for(&record.rel_path) {
        if res.resolution != Resolution::Corpus {
            continue;
        }
        let Some(target) = res.targets.first() else {
            continue;
        };
        let entry = MissingInclude {
            target: target.clone(),
            callee: res.callee.clone(),
            line: res.line,
        };
        if module_name(library, target).is_some() {
            needed.entry(target.clone()).or_insert(entry);
        } else {
            elsewhere.entry(target.clone()).or_insert(entry);
        }
    }
    plan.missing = needed.into_values().collect();
    plan.unsourced = elsewhere.into_values().collect();

    let added: BTreeSet<String> = plan.missing.iter().map(|m| m.target.clone()).collect();
    plan.unused = unused_includes(model, record, &added);
    plan
}

/// Module name of `target` inside the library directory.
fn module_name<'a>(library: &str, target: &'a str) -> Option<&'a str> {
    if library.is_empty() {
        return Some(target);
    }
    target
        .strip_prefix(library)
        .and_then(|rest| rest.strip_prefix('/'))
}

/// Standalone includes whose modules nothing in the entry's sourced set
/// uses. Removal is iterated to a fixpoint: dropping one include can leave
/// another without users.
fn unused_includes(
    model: &Model,
    record: &ScriptRecord,
    added: &BTreeSet<String>,
) -> Vec<UnusedInclude> {
    let file = &record.rel_path;
    let resolved: Vec<(usize, String, bool, String)> = record
        .includes
        .iter()
        .filter_map(|inc| {
            model
                .include_target(file, inc.line)
                .map(|t| (inc.line, t.to_string(), inc.standalone, inc.statement.clone()))
        })
        .collect();

    let active_set = |removed: &BTreeSet<usize>| {
        let mut active = BTreeSet::from([file.clone()]);
        let kept = resolved
            .iter()
            .filter(|(line, ..)| !removed.contains(line))
            .map(|(_, target, ..)| target);
        for target in kept.chain(added.iter()) {
            active.insert(target.clone());
            active.extend(model.modules.closure(target));
        }
        active
    };

    let dynamic = active_set(&BTreeSet::new()).iter().any(|f| {
        model
            .record(f)
            .is_some_and(|r| !r.dynamic_calls.is_empty())
    });
    if dynamic {
        debug!(file = %file, "dynamic dispatch in sourced set, unused includes not checked");
        return Vec::new();
    }

    let mut removed: BTreeSet<usize> = BTreeSet::new();
    loop {
        let active = active_set(&removed);
        let newly: Vec<usize> = resolved
            .iter()
            .filter(|(line, _, standalone, _)| *standalone && !removed.contains(line))
            .filter(|(_, target, ..)| {
                let mut group = model.modules.closure(target);
                group.insert(target.clone());
                !group.contains(file) && !is_used(model, &active, &group)
            })
            .map(|(line, ..)| *line)
            .collect();
        if newly.is_empty() {
            break;
        }
        removed.extend(newly);
    }

    resolved
        .into_iter()
        .filter(|(line, ..)| removed.contains(line))
        .map(|(line, target, _, statement)| UnusedInclude {
            target,
            line,
            statement,
        })
        .collect()
}

/// Something outside `group` but inside `active` calls into it, reads
/// its globals, or the group runs code when sourced.
fn is_used(model: &Model, active: &BTreeSet<String>, group: &BTreeSet<String>) -> bool {
    let records: Vec<&ScriptRecord> = group.iter().filter_map(|f| model.record(f)).collect();
    if records.iter().any(|r| r.top_level_code) {
        return true;
    }

    let users = |f: &String| active.contains(f) && !group.contains(f);
    let called = model
        .resolutions
        .iter()
        .filter(|r| users(&r.file))
        .any(|r| r.targets.iter().any(|t| group.contains(t)));
    if called {
        return true;
    }

    let globals: BTreeSet<&str> = records
        .iter()
        .flat_map(|r| r.globals.iter().map(|g| g.name.as_str()))
        .collect();
    active
        .iter()
        .filter(|f| !group.contains(*f))
        .filter_map(|f| model.record(f))
        .flat_map(|r| r.var_refs.iter())
        .any(|v| globals.contains(v.name.as_str()))
}

fn include_statement(model: &Model, target: &str) -> String {
    let library = model.config.includes.library_dir.trim_matches('/');
    let name = module_name(library, target).unwrap_or(target);
    format!("source \"${{{}}}/{}\"", model.config.includes.base_var, name)
}

pub fn run(model: &Model) -> Vec<Proposal> {
    let mut proposals = Vec::new();
    for record in &model.records {
        let plan = plan(model, record);
        if plan.is_empty() {
            continue;
        }
        debug!(
            file = %record.rel_path,
            missing = plan.missing.len(),
            unused = plan.unused.len(),
            "include plan"
        );
        proposals.extend(proposals_for(model, record, &plan));
    }
    proposals
}

fn proposals_for(model: &Model, record: &ScriptRecord, plan: &IncludePlan) -> Vec<Proposal> {
    let file = &record.rel_path;
    let mut out = Vec::new();

    // All missing includes share one insertion right after the leading
    // comment block, so doc comments further down stay attached.
    if !plan.missing.is_empty() {
        let new_lines: Vec<String> = plan
            .missing
            .iter()
            .map(|m| include_statement(model, &m.target))
            .collect();
        let edit = LineEdit::insert(record.header.len, new_lines, Category::MissingInclude);
        let mut edit = Some(edit);
        for missing in &plan.missing {
            let finding = Finding::new(
                Category::MissingInclude,
                file,
                Some(missing.line),
                format!(
                    "`{}` is defined in {} which is never sourced",
                    missing.callee, missing.target
                ),
            );
            out.push(match edit.take() {
                Some(edit) => Proposal::with_edit(finding, edit),
                None => Proposal {
                    finding,
                    fix: Fix::Shared,
                },
            });
        }
    }

    for unused in &plan.unused {
        let finding = Finding::new(
            Category::UnusedInclude,
            file,
            Some(unused.line),
            format!("`{}` is sourced but nothing from it is used", unused.target),
        );
        out.push(Proposal::with_edit(
            finding,
            LineEdit::delete(unused.line - 1, unused.line, Category::UnusedInclude),
        ));
    }

    for call in &plan.unsourced {
        out.push(Proposal::manual(Finding::new(
            Category::MissingInclude,
            file,
            Some(call.line),
            format!(
                "`{}` is defined in {} which is never sourced",
                call.callee, call.target
            ),
        )));
    }
    out
}
