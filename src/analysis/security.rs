//! Pattern-based security review: `eval`, hardcoded credentials,
//! destructive commands on unquoted variables, world-writable modes,
//! piping downloads into a shell, and writes to system files.
//!
//! Critical patterns are fatal; the rest are advisories.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{code_lines, Proposal};
use crate::finding::{Category, Finding, Severity};
use crate::graph::Model;

struct Pattern {
    regex: Regex,
    message: &'static str,
    critical: bool,
    /// Skip matches that start inside a double-quoted string.
    unless_quoted: bool,
}

fn pattern(re: &str, message: &'static str, critical: bool, unless_quoted: bool) -> Pattern {
    Pattern {
        regex: Regex::new(re).unwrap(),
        message,
        critical,
        unless_quoted,
    }
}

static PATTERNS: Lazy<Vec<Pattern>> = Lazy::new(|| {
    vec![
        pattern(r#"\beval\s+[^"\s]"#, "`eval` of unquoted input can inject code", false, true),
        pattern(
            r#"(?i)password\s*=\s*["'][^"'$]+["']"#,
            "hardcoded password",
            true,
            false,
        ),
        pattern(
            r#"(?i)api[_-]?key\s*=\s*["'][^"'$]+["']"#,
            "hardcoded API key",
            true,
            false,
        ),
        pattern(r#"(?i)secret\s*=\s*["'][^"'$]+["']"#, "hardcoded secret", true, false),
        pattern(
            r"\brm\s+-rf\s+\$\{?[A-Za-z_][A-Za-z0-9_]*\}?",
            "`rm -rf` on an unquoted variable",
            false,
            true,
        ),
        pattern(r"\brm\s+-rf\s+/\s*$", "`rm -rf /`", true, true),
        pattern(r"\bchmod\s+(?:-R\s+)?777\b", "permissions set to 777", false, true),
        pattern(r"\bcurl\b.*\|\s*(?:ba)?sh\b", "download piped into a shell", false, true),
        pattern(r"\bwget\b.*-O\s*-\s*\|.*\bsh\b", "download piped into a shell", false, true),
        pattern(
            r"(?:^|[\s;&|(])\[\s+\$\{?[A-Za-z_][A-Za-z0-9_]*\}?\s+[!=<>]",
            "unquoted variable in `[ ]` test (quote it or use `[[ ]]`)",
            false,
            true,
        ),
        pattern(
            r">\s*(?:/etc/passwd|/etc/shadow|/etc/hosts|/boot)\b",
            "redirect into a system file",
            false,
            true,
        ),
    ]
});

pub fn run(model: &Model) -> Vec<Proposal> {
    let mut out = Vec::new();
    for record in &model.records {
        for (line_no, line, _) in code_lines(record) {
            for pattern in PATTERNS.iter() {
                let Some(found) = pattern.regex.find(line) else {
                    continue;
                };
                if pattern.unless_quoted && inside_double_quotes(line, found.start()) {
                    continue;
                }
                let severity = if pattern.critical {
                    Severity::Fatal
                } else {
                    Severity::Advisory
                };
                let finding =
                    Finding::new(Category::Security, &record.rel_path, Some(line_no), pattern.message);
                out.push(Proposal::manual(finding.with_severity(severity)));
            }
        }
    }
    out
}

/// An odd number of unescaped `"` before `pos`.
fn inside_double_quotes(line: &str, pos: usize) -> bool {
    let mut quotes = 0;
    let mut escaped = false;
    for c in line[..pos].chars() {
        match c {
            '\\' if !escaped => escaped = true,
            '"' if !escaped => quotes += 1,
            _ => escaped = false,
        }
        if c != '\\' {
            escaped = false;
        }
    }
    quotes % 2 == 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TetherConfig;
    use crate::parser::{index_source, IndexContext};
    use indoc::indoc;
    use std::path::Path;

    fn findings(text: &str) -> Vec<Finding> {
        let record = index_source(
            Path::new("/corpus/run.sh"),
            "run.sh",
            text,
            &IndexContext::default(),
        )
        .unwrap();
        let model = Model::build(vec![record], Path::new("/corpus"), &TetherConfig::default());
        run(&model).into_iter().map(|p| p.finding).collect()
    }

    #[test]
    fn test_patterns() {
        let found = findings(indoc! {r#"
            #!/bin/bash
            DB_PASSWORD="hunter2"
            eval $CMD
            rm -rf $BUILD_DIR
            rm -rf "$BUILD_DIR"
            chmod 777 /srv/share
            curl -fsSL https://example.invalid/install | bash
            if [ $answer = "y" ]; then :; fi
            if [[ $answer = "y" ]]; then :; fi
            echo "eval later" > /dev/null
            # password="commented"
        "#});
        let summary: Vec<_> = found
            .iter()
            .map(|f| (f.line, f.message.as_str(), f.severity))
            .collect();
        assert_eq!(
            summary,
            vec![
                (Some(2), "hardcoded password", Severity::Fatal),
                (Some(3), "`eval` of unquoted input can inject code", Severity::Advisory),
                (Some(4), "`rm -rf` on an unquoted variable", Severity::Advisory),
                (Some(6), "permissions set to 777", Severity::Advisory),
                (Some(7), "download piped into a shell", Severity::Advisory),
                (
                    Some(8),
                    "unquoted variable in `[ ]` test (quote it or use `[[ ]]`)",
                    Severity::Advisory
                ),
            ]
        );
    }

    #[test]
    fn test_quote_tracking() {
        assert!(inside_double_quotes(r#"echo "a $b"#, 8));
        assert!(!inside_double_quotes(r#"echo "a" $b"#, 9));
        assert!(inside_double_quotes(r#"echo "a \" $b"#, 11));
    }
}
