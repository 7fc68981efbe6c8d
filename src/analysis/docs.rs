//! Documentation coverage: header description, usage and example sections
//! for entry scripts, doc comments for every function.

use super::Proposal;
use crate::finding::{Category, Finding};
use crate::graph::{Model, Role};

pub fn run(model: &Model, strict: bool) -> Vec<Proposal> {
    let config = &model.config.docs;
    let mut out = Vec::new();
    for record in &model.records {
        let file = &record.rel_path;
        let header = &record.header;
        let mut report = |line: Option<usize>, message: String| {
            out.push(Proposal::manual(Finding::new(
                Category::Documentation,
                file,
                line,
                message,
            )));
        };

        if header.description.len() < config.min_description_lines {
            report(
                None,
                format!(
                    "header has {} description line(s), expected at least {}",
                    header.description.len(),
                    config.min_description_lines
                ),
            );
        }

        // Libraries are sourced, never run: usage and examples only make
        // sense for scripts people execute.
        if model.role(file) == Role::Entry {
            if config.require_usage && !header.has_usage {
                report(None, "header has no `Usage:` section".to_string());
            }
            if strict && config.require_example_in_strict && !header.has_example {
                report(None, "header has no `Example:` section".to_string());
            }
        }

        for def in record.authoritative_functions().filter(|f| f.doc.is_none()) {
            report(
                Some(def.line_start),
                format!("function `{}` has no doc comment", def.name),
            );
        }
    }
    out
}
