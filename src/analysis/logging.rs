//! Logging coverage for library modules: every function in a module that
//! has a configured log function must call it somewhere in its body.

use std::collections::BTreeSet;
use tracing::debug;

use super::Proposal;
use crate::finding::{Category, Finding};
use crate::graph::Model;

pub fn run(model: &Model) -> Vec<Proposal> {
    let config = &model.config.logging;
    let library = model.config.includes.library_dir.trim_matches('/');
    let log_functions: BTreeSet<&str> = config.functions.values().map(String::as_str).collect();

    let mut out = Vec::new();
    for (module, log_fn) in &config.functions {
        let path = if library.is_empty() {
            module.clone()
        } else {
            format!("{}/{}", library, module)
        };
        let Some(record) = model.record(&path) else {
            debug!(module = %path, "logged module not in corpus");
            continue;
        };

        let mut checked = 0usize;
        for def in record.authoritative_functions() {
            if log_functions.contains(def.name.as_str()) || config.excluded.contains(&def.name) {
                continue;
            }
            checked += 1;
            let logs = record
                .calls
                .iter()
                .any(|c| c.callee == *log_fn && def.contains_line(c.line));
            if !logs {
                out.push(Proposal::manual(Finding::new(
                    Category::LoggingCoverage,
                    &record.rel_path,
                    Some(def.line_start),
                    format!("`{}` never calls `{}`", def.name, log_fn),
                )));
            }
        }
        debug!(module = %path, functions = checked, "logging coverage checked");
    }
    out
}
