//! Function index synchronization.
//!
//! Every script header may carry a manifest of the functions it defines:
//!
//! ```text
//! # Function Index:
//! #   - __first__
//! #   - second
//! #
//! ```
//!
//! This module computes the canonical list for a script and the single
//! edit that makes the header match it.

use std::collections::BTreeSet;
use tracing::debug;

use super::Proposal;
use crate::config::IndexConfig;
use crate::finding::{Category, Finding};
use crate::fix::LineEdit;
use crate::graph::types::ScriptRecord;
use crate::graph::Model;

/// Result of comparing a header manifest with the script's definitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexSync {
    InSync,
    OutOfSync {
        /// Names the canonical list has and the header lacks.
        missing: Vec<String>,
        /// Names the header lists that are not (public) definitions.
        stale: Vec<String>,
        edit: LineEdit,
    },
}

/// `_helper` is private; `__name__` is the library convention and is not.
pub fn is_private(name: &str) -> bool {
    name.starts_with('_') && !name.starts_with("__")
}

/// Names the manifest should list: authoritative definitions in order of
/// first appearance, without duplicates.
pub fn canonical_names(record: &ScriptRecord, config: &IndexConfig) -> Vec<String> {
    let mut seen = BTreeSet::new();
    record
        .functions
        .iter()
        .filter(|f| !(config.exclude_private && is_private(&f.name)))
        .filter(|f| seen.insert(f.name.as_str()))
        .map(|f| f.name.clone())
        .collect()
}

/// The exact manifest block for `names`.
pub fn render_block(names: &[String], marker: &str) -> Vec<String> {
    let mut block = Vec::with_capacity(names.len() + 2);
    block.push(format!("# {}", marker.trim()));
    block.extend(names.iter().map(|n| format!("#   - {}", n)));
    block.push("#".to_string());
    block
}

pub fn synchronize(record: &ScriptRecord, config: &IndexConfig) -> IndexSync {
    let canonical = canonical_names(record, config);
    let declared: Vec<String> = record
        .header
        .manifest
        .as_ref()
        .map(|m| m.entries.iter().map(|e| e.trim().to_string()).collect())
        .unwrap_or_default();

    let wanted: BTreeSet<&str> = canonical.iter().map(|s| s.as_str()).collect();
    let have: BTreeSet<&str> = declared.iter().map(|s| s.as_str()).collect();
    let missing: Vec<String> = wanted.difference(&have).map(|s| s.to_string()).collect();
    let stale: Vec<String> = have.difference(&wanted).map(|s| s.to_string()).collect();

    let edit = match &record.header.manifest {
        Some(block) if missing.is_empty() && stale.is_empty() => {
            // An empty declared block still gets removed.
            if !canonical.is_empty() {
                return IndexSync::InSync;
            }
            LineEdit::delete(block.marker_line - 1, block.last_line, Category::FunctionIndex)
        }
        Some(block) if canonical.is_empty() => {
            LineEdit::delete(block.marker_line - 1, block.last_line, Category::FunctionIndex)
        }
        Some(block) => LineEdit::replace(
            block.marker_line - 1,
            block.last_line,
            render_block(&canonical, &config.marker),
            Category::FunctionIndex,
        ),
        None if canonical.is_empty() => return IndexSync::InSync,
        None => LineEdit::insert(
            record.header.len,
            render_block(&canonical, &config.marker),
            Category::FunctionIndex,
        ),
    };

    IndexSync::OutOfSync {
        missing,
        stale,
        edit,
    }
}

pub fn run(model: &Model) -> Vec<Proposal> {
    let config = &model.config.index;
    let mut proposals = Vec::new();
    for record in &model.records {
        let IndexSync::OutOfSync {
            missing,
            stale,
            edit,
        } = synchronize(record, config)
        else {
            continue;
        };

        let mut parts = Vec::new();
        if !missing.is_empty() {
            parts.push(format!("missing {}", missing.join(", ")));
        }
        if !stale.is_empty() {
            parts.push(format!("stale {}", stale.join(", ")));
        }
        let message = match (&record.header.manifest, parts.is_empty()) {
            (None, _) => "function index is missing from the header".to_string(),
            (Some(_), true) => "function index is empty and should be removed".to_string(),
            (Some(_), false) => format!("function index is out of date: {}", parts.join("; ")),
        };
        let line = record.header.manifest.as_ref().map(|m| m.marker_line);
        debug!(file = %record.rel_path, missing = missing.len(), stale = stale.len(), "function index out of sync");
        proposals.push(Proposal::with_edit(
            Finding::new(Category::FunctionIndex, &record.rel_path, line, message),
            edit,
        ));
    }
    proposals
}
