//! The trailing `# Script notes:` block every script carries: a change log
//! with a fixed set of sections. A missing block is appended from the
//! template; a block missing sections is rebuilt around the sections it
//! has. Dates stay as placeholders for a human to fill in.

use once_cell::sync::Lazy;
use regex::Regex;

use super::Proposal;
use crate::config::NotesConfig;
use crate::finding::{Category, Finding};
use crate::fix::LineEdit;
use crate::graph::Model;

static SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{3,}$").unwrap());
static LAST_CHECKED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#\s*Last checked:").unwrap());

const RULE_WIDTH: usize = 79;

pub fn run(model: &Model) -> Vec<Proposal> {
    let config = &model.config.notes;
    let mut out = Vec::new();
    for record in &model.records {
        let lines = record.lines();
        let file = &record.rel_path;
        match find_block(&lines, &config.marker) {
            None => {
                let mut new_lines = Vec::new();
                if lines.last().is_some_and(|l| !l.trim().is_empty()) {
                    new_lines.push(String::new());
                }
                new_lines.extend(template(config));
                out.push(Proposal::with_edit(
                    Finding::new(
                        Category::ScriptNotes,
                        file,
                        None,
                        format!("no `{}` block", config.marker),
                    ),
                    LineEdit::insert(lines.len(), new_lines, Category::ScriptNotes),
                ));
            }
            Some((start, end)) => {
                let block = &lines[start..=end];
                let missing: Vec<&str> = config
                    .sections
                    .iter()
                    .filter(|s| !block.iter().any(|l| is_heading(l, s)))
                    .map(String::as_str)
                    .collect();
                if missing.is_empty() {
                    continue;
                }
                out.push(Proposal::with_edit(
                    Finding::new(
                        Category::ScriptNotes,
                        file,
                        Some(start + 1),
                        format!("script notes are missing {}", missing.join(", ")),
                    ),
                    LineEdit::replace(start, end + 1, repaired(block, config), Category::ScriptNotes),
                ));
            }
        }
    }
    out
}

/// First and last line (0-based, inclusive) of the notes block.
///
/// The block opens on a separator pair framing the marker, searched from
/// the bottom. Older blocks carry the bare marker line instead.
fn find_block(lines: &[&str], marker: &str) -> Option<(usize, usize)> {
    let separators: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, l)| SEPARATOR.is_match(l.trim_end()))
        .map(|(i, _)| i)
        .collect();
    for pair in separators.windows(2).rev() {
        if (pair[0]..=pair[1]).any(|i| is_heading(lines[i], marker)) {
            return Some((pair[0], block_end(lines, pair[1])));
        }
    }
    let start = (0..lines.len())
        .rev()
        .find(|&i| comment_text(lines[i]).is_some_and(|t| t.starts_with(marker)))?;
    Some((start, block_end(lines, start)))
}

/// Last comment line of the run continuing after `from`. Blank lines may
/// sit inside the run but never end it.
fn block_end(lines: &[&str], from: usize) -> usize {
    let mut end = from;
    for (i, line) in lines.iter().enumerate().skip(from + 1) {
        let t = line.trim();
        if t.starts_with('#') {
            end = i;
        } else if !t.is_empty() {
            break;
        }
    }
    end
}

fn comment_text(line: &str) -> Option<&str> {
    line.strip_prefix('#').map(str::trim)
}

fn is_heading(line: &str, text: &str) -> bool {
    comment_text(line) == Some(text)
}

fn template(config: &NotesConfig) -> Vec<String> {
    let rule = "#".repeat(RULE_WIDTH);
    let mut out = vec![
        rule.clone(),
        format!("# {}", config.marker),
        rule,
        "# Last checked: YYYY-MM-DD".to_string(),
        "#".to_string(),
    ];
    for (i, section) in config.sections.iter().enumerate() {
        out.push(format!("# {}", section));
        out.push(if i == 0 {
            "# - YYYY-MM-DD: Initial creation".to_string()
        } else {
            "# -".to_string()
        });
        out.push("#".to_string());
    }
    out
}

/// The block with every section present, in configured order. Existing
/// sections keep their content. Without a `Last checked:` line there is
/// nothing to anchor on and the template replaces the block.
fn repaired(block: &[&str], config: &NotesConfig) -> Vec<String> {
    let Some(checked) = block.iter().position(|l| LAST_CHECKED.is_match(l)) else {
        return template(config);
    };
    let mut out: Vec<String> = block[..=checked].iter().map(|l| l.to_string()).collect();
    out.push("#".to_string());

    let positions: Vec<Option<usize>> = config
        .sections
        .iter()
        .map(|s| block.iter().rposition(|l| is_heading(l, s)))
        .collect();
    for (section, pos) in config.sections.iter().zip(&positions) {
        match pos {
            Some(at) => {
                let next = positions
                    .iter()
                    .flatten()
                    .copied()
                    .filter(|p| p > at)
                    .min()
                    .unwrap_or(block.len());
                out.extend(block[*at..next].iter().map(|l| l.to_string()));
            }
            None => out.extend([format!("# {}", section), "# -".to_string(), "#".to_string()]),
        }
    }
    if out.last().is_some_and(|l| l.trim() != "#") {
        out.push("#".to_string());
    }
    out
}
