//! Error handling hygiene: shell options in entry scripts, unchecked
//! critical commands, and under `strict` implicit function returns and
//! unchecked command substitutions.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{code_lines, Proposal};
use crate::finding::{Category, Finding};
use crate::graph::types::ScriptRecord;
use crate::graph::{Model, Role};
use crate::parser::lexer::LineScan;

static SET_E: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*set\s+-[a-z]*e").unwrap());
static SET_U: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*set\s+-[a-z]*u").unwrap());
static PIPEFAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*set\s+(?:-[a-z]*o\s+pipefail|-o\s+pipefail)").unwrap());
static TRAP_ERR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*trap\s+.*\sERR\b").unwrap());
static EXPLICIT_EXIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:return|exit)\s+(?:\d+|[$\w]+)").unwrap());
static SUBST_ASSIGN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:local\s+|declare\s+)?([A-Za-z_][A-Za-z0-9_]*)\s*=\s*\$\(").unwrap()
});

/// Lines after a command that may test its status.
const STATUS_WINDOW: usize = 3;
/// Lines after a substitution that may test its result.
const RESULT_WINDOW: usize = 10;

pub fn run(model: &Model, strict: bool) -> Vec<Proposal> {
    let mut out = Vec::new();
    for record in &model.records {
        let findings = check_record(model, record, strict);
        out.extend(findings.into_iter().map(Proposal::manual));
    }
    out
}

fn check_record(model: &Model, record: &ScriptRecord, strict: bool) -> Vec<Finding> {
    let config = &model.config.error_handling;
    let file = &record.rel_path;
    let lines = record.lines();
    let code = code_lines(record);
    let has = |re: &Lazy<Regex>| any_line(&code, re);
    let has_set_e = has(&SET_E);
    let mut out = Vec::new();

    // Shell options belong to the script that runs; a library that sets
    // them changes its caller.
    if model.role(file) == Role::Entry {
        let mut options = vec![(
            has_set_e,
            "no `set -e`: failing commands do not stop the script",
        )];
        if strict {
            options.extend([
                (has(&SET_U), "no `set -u`: unset variables expand to nothing"),
                (has(&PIPEFAIL), "no `set -o pipefail`: pipeline failures are masked"),
                (has(&TRAP_ERR), "no `trap ... ERR` handler"),
            ]);
        }
        for (present, message) in options {
            if !present {
                out.push(Finding::new(Category::ErrorHandling, file, None, message));
            }
        }
    }

    if !has_set_e || strict {
        for (line_no, line, scan) in &code {
            let Some(cmd) = scan
                .commands()
                .find(|c| config.critical_commands.contains(&c.name))
            else {
                continue;
            };
            let window = following(&lines, *line_no, STATUS_WINDOW);
            if !is_checked(line) && !window.iter().any(|l| l.contains("$?")) {
                out.push(Finding::new(
                    Category::ErrorHandling,
                    file,
                    Some(*line_no),
                    format!("`{}` runs without checking its exit status", cmd.name),
                ));
            }
        }
    }

    if strict {
        for def in record.authoritative_functions() {
            let span = def.line_end + 1 - def.line_start;
            if span <= config.max_implicit_return_lines {
                continue;
            }
            let body = &lines[def.line_start - 1..def.line_end.min(lines.len())];
            if !body.iter().any(|l| EXPLICIT_EXIT.is_match(l)) {
                out.push(Finding::new(
                    Category::ErrorHandling,
                    file,
                    Some(def.line_start),
                    format!(
                        "function `{}` spans {} lines without an explicit `return` or `exit`",
                        def.name, span
                    ),
                ));
            }
        }
        out.extend(unchecked_substitutions(file, &lines, &code));
    }
    out
}

/// Up to `count` lines after 1-indexed `line_no`.
fn following<'a>(lines: &'a [&'a str], line_no: usize, count: usize) -> &'a [&'a str] {
    let start = line_no.min(lines.len());
    &lines[start..(line_no + count).min(lines.len())]
}

fn any_line(code: &[(usize, &str, LineScan)], re: &Regex) -> bool {
    code.iter().any(|(_, line, _)| re.is_match(line))
}

/// The status is consumed on the line itself.
fn is_checked(line: &str) -> bool {
    let t = line.trim();
    t.starts_with("if ")
        || t.contains(" || ")
        || t.contains(" && ")
        || t.ends_with("|| \\")
        || t.ends_with("&& \\")
}

fn unchecked_substitutions(
    file: &str,
    lines: &[&str],
    code: &[(usize, &str, LineScan)],
) -> Vec<Finding> {
    let mut out = Vec::new();
    for (line_no, line, _) in code {
        let Some(caps) = SUBST_ASSIGN.captures(line) else {
            continue;
        };
        if is_checked(line) {
            continue;
        }
        let next = lines.get(*line_no).map_or("", |l| l.trim());
        if next.contains("$?") || next.contains("if [") {
            continue;
        }
        let var = &caps[1];
        let plain = format!("${}", var);
        let braced = format!("${{{}}}", var);
        let later = following(lines, *line_no, RESULT_WINDOW);
        let tested = later.iter().any(|l| {
            (l.contains(&plain) || l.contains(&braced))
                && (l.contains("||") || l.contains("&&") || l.contains("if"))
        });
        if !tested {
            out.push(Finding::new(
                Category::ErrorHandling,
                file,
                Some(*line_no),
                format!("`{}` is assigned from a command substitution nobody checks", var),
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TetherConfig;
    use crate::parser::{index_source, IndexContext};
    use indoc::indoc;
    use std::path::Path;

    fn messages(rel: &str, text: &str, strict: bool) -> Vec<(Option<usize>, String)> {
        let record = index_source(
            &Path::new("/corpus").join(rel),
            rel,
            text,
            &IndexContext::default(),
        )
        .unwrap();
        let model = Model::build(vec![record], Path::new("/corpus"), &TetherConfig::default());
        run(&model, strict)
            .into_iter()
            .map(|p| (p.finding.line, p.finding.message))
            .collect()
    }

    #[test]
    fn test_set_e_covers_critical_commands() {
        let text = indoc! {r#"
            #!/bin/bash
            set -euo pipefail
            trap cleanup ERR
            rm -rf "$TMP"
        "#};
        assert!(messages("run.sh", text, false).is_empty());
        assert!(messages("run.sh", text, true).iter().any(|(line, _)| *line == Some(4)));
    }

    #[test]
    fn test_unchecked_critical_commands() {
        let text = indoc! {r#"
            #!/bin/bash
            cp a b || exit 1
            if mv a b; then :; fi
            rsync -a src/ dst/
            if [ $? -ne 0 ]; then exit 1; fi
            cat <<EOF
            rm -rf /
            EOF
            # rm old files
            git pull
            echo done
        "#};
        assert_eq!(
            messages("run.sh", text, false),
            vec![
                (None, "no `set -e`: failing commands do not stop the script".to_string()),
                (Some(10), "`git` runs without checking its exit status".to_string()),
            ]
        );
    }

    #[test]
    fn test_libraries_are_not_asked_for_shell_options() {
        let text = "__sync__() {\n  rsync -a \"$1\" \"$2\" || return 1\n}\n";
        assert!(messages("Utilities/Sync.sh", text, true).is_empty());
    }

    #[test]
    fn test_strict_function_returns_and_substitutions() {
        let text = indoc! {r#"
            __collect__() {
                local out
                out=$(pvesh get /nodes)
                echo "$out"
                echo more
                echo done
            }

            __checked__() {
                local nodes
                nodes=$(pvesh get /nodes)
                if [[ -z "$nodes" ]]; then
                    return 1
                fi
                return 0
            }
        "#};
        let found = messages("Utilities/Cluster.sh", text, true);
        assert_eq!(
            found,
            vec![
                (Some(3), "`pvesh` runs without checking its exit status".to_string()),
                (Some(11), "`pvesh` runs without checking its exit status".to_string()),
                (
                    Some(1),
                    "function `__collect__` spans 7 lines without an explicit `return` or `exit`"
                        .to_string()
                ),
                (
                    Some(3),
                    "`out` is assigned from a command substitution nobody checks".to_string()
                ),
            ]
        );
    }
}
