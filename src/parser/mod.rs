//! Source indexer: turns one script into a `ScriptRecord`.
//!
//! Built on the line tokenizer in [`lexer`] and the header reader in
//! [`header`]. Pure: no I/O, no global state.

pub mod header;
pub mod language;
pub mod lexer;

pub use language::ShellDialect;

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::config::TetherConfig;
use crate::error::ParseError;
use crate::graph::types::{
    CallKind, CallSite, FunctionDef, GlobalVar, IncludeRef, IncludeTarget, LineEndings,
    ScriptRecord, VarRef,
};
use lexer::{is_identifier, Event, Lexer};

/// `name() {` / `function name() {` / `function name {`, brace optional.
static FUNC_DEF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(function\s+)?([A-Za-z_][A-Za-z0-9_]*)\s*\(\s*\)\s*(\{|\(|$)").unwrap()
});
static FUNC_DEF_KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*function\s+([A-Za-z_][A-Za-z0-9_]*)\s*(\{.*)?$").unwrap()
});

/// Top-level assignment, optionally behind a declaration builtin.
static ASSIGNMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:(export|declare|readonly|typeset)\s+(?:-[A-Za-z]+\s+)*)?([A-Za-z_][A-Za-z0-9_]*)(?:\[[^\]]*\])?\+?=(.*)$",
    )
    .unwrap()
});
static EXPORT_NAMES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*export\s+([A-Za-z_][A-Za-z0-9_\s]*)$").unwrap());
static GLOBAL_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z_][A-Z0-9_]*$").unwrap());

/// `$(dirname "$0")`, `$(dirname "${BASH_SOURCE[0]}")`, `${BASH_SOURCE%/*}`
/// and the `cd ... && pwd` wrapper, after quotes are removed.
static OWN_DIR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:\$\(\s*dirname\s+(?:\$0|\$\{0\}|\$\{?BASH_SOURCE(?:\[0\])?\}?)\s*\)|\$\{BASH_SOURCE(?:\[0\])?%/\*\}|\$\(\s*cd\s+\$\(\s*dirname\s+(?:\$0|\$\{0\}|\$\{?BASH_SOURCE(?:\[0\])?\}?)\s*\)\s*(?:&&|;)\s*pwd\s*\))(?:/(.*))?$",
    )
    .unwrap()
});
/// `$VAR/rest` or `${VAR}/rest`.
static VAR_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\$(?:\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))(/.*)?$").unwrap()
});
static STANDALONE_INCLUDE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(?:source|\.)\s+(?:"[^"]*"|'[^']*'|[^\s;&|'"]+)$"#).unwrap()
});

/// Commands that declare rather than run: they don't make a file "executable".
const DECLARATIONS: &[&str] = &[
    "source", ".", "export", "declare", "readonly", "typeset", "local", "set", "shopt", "trap",
    "unset", "alias", "umask",
];

/// The parts of the config the indexer needs.
#[derive(Debug, Clone)]
pub struct IndexContext {
    pub base_var: String,
    pub manifest_marker: String,
}

impl IndexContext {
    pub fn from_config(config: &TetherConfig) -> Self {
        Self {
            base_var: config.includes.base_var.clone(),
            manifest_marker: config.index.marker.clone(),
        }
    }
}

impl Default for IndexContext {
    fn default() -> Self {
        Self::from_config(&TetherConfig::default())
    }
}

/// Index raw file contents, rejecting binary and non-UTF-8 input.
pub fn index_bytes(
    path: &Path,
    rel_path: &str,
    bytes: &[u8],
    ctx: &IndexContext,
) -> Result<ScriptRecord, ParseError> {
    if let Some(pos) = bytes.iter().position(|b| *b == 0) {
        let line = bytes[..pos].iter().filter(|b| **b == b'\n').count() + 1;
        return Err(ParseError::Binary { line });
    }
    let text = std::str::from_utf8(bytes).map_err(|_| ParseError::InvalidUtf8)?;
    index_source(path, rel_path, text, ctx)
}

/// Open function body while scanning.
struct OpenFunction {
    name: String,
    line_start: usize,
    body_depth: usize,
}

/// Parse one script into a `ScriptRecord`.
pub fn index_source(
    path: &Path,
    rel_path: &str,
    text: &str,
    ctx: &IndexContext,
) -> Result<ScriptRecord, ParseError> {
    if let Some(pos) = text.find('\0') {
        let line = text[..pos].matches('\n').count() + 1;
        return Err(ParseError::Binary { line });
    }

    let lines: Vec<&str> = text
        .split_inclusive('\n')
        .map(|l| l.trim_end_matches('\n').trim_end_matches('\r'))
        .collect();
    let header = header::read_header(&lines, &ctx.manifest_marker)?;
    let assignments = top_level_assignments(&lines);

    let mut lexer = Lexer::new();
    let mut depth = 0usize;
    let mut open: Vec<OpenFunction> = Vec::new();
    let mut pending_def: Option<(String, usize)> = None;
    let mut defs: Vec<(String, usize, usize)> = Vec::new();

    let mut includes = Vec::new();
    let mut calls = Vec::new();
    let mut globals: Vec<GlobalVar> = Vec::new();
    let mut exported: HashSet<String> = HashSet::new();
    let mut var_refs = Vec::new();
    let mut arg_words: Vec<String> = Vec::new();
    let mut dynamic_calls = Vec::new();
    let mut top_level_code = false;

    for (idx, line) in lines.iter().enumerate() {
        let line_no = idx + 1;
        let at_top = lexer.at_top();
        let in_function = !open.is_empty();
        let scan = lexer.scan_line(line);

        var_refs.extend(scan.vars.iter().map(|name| VarRef {
            name: name.clone(),
            line: line_no,
        }));
        if scan.heredoc_body {
            continue;
        }
        if scan.dynamic {
            dynamic_calls.push(line_no);
        }
        arg_words.extend(scan.args.iter().cloned());

        let mut skip_name = None;
        if at_top {
            if let Some(name) = definition_name(line) {
                if let Some((prev, start)) = pending_def.take() {
                    defs.push((prev, start, start));
                }
                if !line.trim_start().starts_with("function") {
                    skip_name = Some(name.clone());
                }
                pending_def = Some((name, line_no));
            }
            if !in_function {
                record_global(line, line_no, &mut globals, &mut exported);
            }
        }

        for event in scan.events {
            match event {
                Event::Open => {
                    depth += 1;
                    if let Some((name, line_start)) = pending_def.take() {
                        open.push(OpenFunction {
                            name,
                            line_start,
                            body_depth: depth,
                        });
                    }
                }
                Event::Close => {
                    if open.last().is_some_and(|f| f.body_depth == depth) {
                        if let Some(f) = open.pop() {
                            defs.push((f.name, f.line_start, line_no));
                        }
                    }
                    depth = depth.saturating_sub(1);
                }
                Event::CasePattern(_) => {}
                Event::Command(cmd) => {
                    if skip_name.as_deref() == Some(cmd.name.as_str()) {
                        skip_name = None;
                        continue;
                    }
                    if let Some((name, start)) = pending_def.take() {
                        // Body is not a brace group (`f() ( ... )`).
                        defs.push((name, start, line_no));
                    }
                    let caller = open.last().map(|f| f.name.clone());
                    let caller_line = open.last().map(|f| f.line_start);
                    if caller.is_none() && !DECLARATIONS.contains(&cmd.name.as_str()) {
                        top_level_code = true;
                    }
                    match cmd.name.as_str() {
                        "source" | "." => {
                            if let Some(arg) = &cmd.first_arg {
                                includes.push(include_ref(arg, line, line_no, ctx, &assignments));
                            }
                        }
                        "trap" => {
                            if let Some(handler) = cmd.first_arg.as_deref().and_then(trap_handler)
                            {
                                calls.push(CallSite {
                                    callee: handler,
                                    line: line_no,
                                    caller,
                                    caller_line,
                                    kind: CallKind::Trap,
                                });
                            }
                        }
                        name if cmd.plain && is_identifier(name) => calls.push(CallSite {
                            callee: name.to_string(),
                            line: line_no,
                            caller,
                            caller_line,
                            kind: CallKind::Command,
                        }),
                        _ => {}
                    }
                }
            }
        }
    }

    if let Some(f) = open.first() {
        return Err(ParseError::UnclosedFunction {
            name: f.name.clone(),
            line: f.line_start,
        });
    }
    if let Some((name, start)) = pending_def.take() {
        defs.push((name, start, start));
    }

    for global in &mut globals {
        if exported.contains(&global.name) {
            global.exported = true;
        }
    }

    let functions = build_functions(defs, &lines, &header);
    arg_words.sort();
    arg_words.dedup();

    Ok(ScriptRecord {
        path: path.to_path_buf(),
        rel_path: rel_path.to_string(),
        text: text.to_string(),
        header,
        includes,
        functions,
        calls,
        globals,
        var_refs,
        arg_words,
        dynamic_calls,
        top_level_code,
        line_endings: line_endings(text),
    })
}

/// Name defined on this line, if it opens a function.
fn definition_name(line: &str) -> Option<String> {
    if let Some(caps) = FUNC_DEF.captures(line) {
        return Some(caps[2].to_string());
    }
    FUNC_DEF_KEYWORD
        .captures(line)
        .map(|caps| caps[1].to_string())
}

fn build_functions(
    mut defs: Vec<(String, usize, usize)>,
    lines: &[&str],
    header: &crate::graph::types::HeaderInfo,
) -> Vec<FunctionDef> {
    defs.sort_by_key(|(_, start, _)| *start);
    let manifest: HashSet<&str> = header
        .manifest
        .iter()
        .flat_map(|m| m.entries.iter().map(|s| s.as_str()))
        .collect();
    let mut last_def: HashMap<&str, usize> = HashMap::new();
    for (i, (name, _, _)) in defs.iter().enumerate() {
        last_def.insert(name.as_str(), i);
    }

    defs.iter()
        .enumerate()
        .map(|(i, (name, start, end))| FunctionDef {
            name: name.clone(),
            line_start: *start,
            line_end: *end,
            doc: doc_comment(lines, *start, header.len),
            in_manifest: manifest.contains(name.as_str()),
            shadowed: last_def.get(name.as_str()) != Some(&i),
        })
        .collect()
}

/// Contiguous comment lines directly above `line_start`, outside the header.
fn doc_comment(lines: &[&str], line_start: usize, header_len: usize) -> Option<String> {
    let mut collected = Vec::new();
    let mut idx = line_start.saturating_sub(1);
    while idx > header_len {
        let line = lines[idx - 1];
        if !line.trim_start().starts_with('#') {
            break;
        }
        let body = header::comment_body(line);
        if !body.is_empty() && !header::is_separator(body) {
            collected.push(body);
        }
        idx -= 1;
    }
    if collected.is_empty() {
        return None;
    }
    collected.reverse();
    Some(collected.join("\n"))
}

fn record_global(
    line: &str,
    line_no: usize,
    globals: &mut Vec<GlobalVar>,
    exported: &mut HashSet<String>,
) {
    if let Some(caps) = ASSIGNMENT.captures(line) {
        let name = &caps[2];
        let is_export = caps.get(1).is_some_and(|m| m.as_str() == "export")
            || line.trim_start().starts_with("declare -x");
        if is_export {
            exported.insert(name.to_string());
        }
        if GLOBAL_NAME.is_match(name) && !globals.iter().any(|g| g.name == name) {
            globals.push(GlobalVar {
                name: name.to_string(),
                line: line_no,
                exported: is_export,
            });
        }
    } else if let Some(caps) = EXPORT_NAMES.captures(line.trim_end()) {
        exported.extend(caps[1].split_whitespace().map(str::to_string));
    }
}

/// First value of every top-level `NAME=value`, quotes removed.
fn top_level_assignments(lines: &[&str]) -> HashMap<String, String> {
    let mut values = HashMap::new();
    for line in lines {
        if line.starts_with(' ') || line.starts_with('\t') {
            continue;
        }
        if let Some(caps) = ASSIGNMENT.captures(line) {
            let value = strip_quotes(caps[3].trim());
            values.entry(caps[2].to_string()).or_insert(value);
        }
    }
    values
}

fn strip_quotes(raw: &str) -> String {
    raw.chars().filter(|c| *c != '"' && *c != '\'').collect()
}

fn include_ref(
    raw_arg: &str,
    line: &str,
    line_no: usize,
    ctx: &IndexContext,
    assignments: &HashMap<String, String>,
) -> IncludeRef {
    let template = strip_quotes(raw_arg);
    let (target, via) = match resolve_template(&template, ctx) {
        Some(target) => (target, None),
        None => substitute_once(&template, ctx, assignments)
            .map(|(target, var)| (target, Some(var)))
            .unwrap_or_else(|| (IncludeTarget::Unresolved(template.clone()), None)),
    };
    let statement = line.trim().to_string();
    IncludeRef {
        raw: template,
        needs_manual_review: matches!(target, IncludeTarget::Unresolved(_)),
        target,
        line: line_no,
        via,
        standalone: STANDALONE_INCLUDE.is_match(&statement),
        statement,
    }
}

/// Resolve a template without variable substitution.
fn resolve_template(template: &str, ctx: &IndexContext) -> Option<IncludeTarget> {
    let braced = format!("${{{}}}/", ctx.base_var);
    let bare = format!("${}/", ctx.base_var);
    if let Some(rest) = template
        .strip_prefix(&braced)
        .or_else(|| template.strip_prefix(&bare))
    {
        return (!has_expansion(rest) && !rest.is_empty())
            .then(|| IncludeTarget::Module(rest.to_string()));
    }
    if let Some(caps) = OWN_DIR.captures(template) {
        let rest = caps.get(1).map_or("", |m| m.as_str());
        return (!has_expansion(rest) && !rest.is_empty())
            .then(|| IncludeTarget::Path(rest.to_string()));
    }
    (!has_expansion(template) && !template.is_empty())
        .then(|| IncludeTarget::Path(template.to_string()))
}

/// One hop through a same-file assignment: `$LIB/x.sh` with `LIB=...`.
fn substitute_once(
    template: &str,
    ctx: &IndexContext,
    assignments: &HashMap<String, String>,
) -> Option<(IncludeTarget, String)> {
    let caps = VAR_PREFIX.captures(template)?;
    let var = caps.get(1).or_else(|| caps.get(2))?.as_str();
    let value = assignments.get(var)?;
    let rest = caps.get(3).map_or("", |m| m.as_str());
    let substituted = format!("{}{}", value, rest);
    resolve_template(&substituted, ctx).map(|target| (target, var.to_string()))
}

fn has_expansion(text: &str) -> bool {
    text.contains('$') || text.contains('`')
}

/// Function named by the first argument of `trap`.
fn trap_handler(raw: &str) -> Option<String> {
    let arg = strip_quotes(raw);
    let first = arg
        .split(|c: char| c.is_whitespace() || c == ';')
        .find(|s| !s.is_empty())?;
    is_identifier(first).then(|| first.to_string())
}

fn line_endings(text: &str) -> LineEndings {
    let crlf = text.matches("\r\n").count();
    let lf = text.matches('\n').count() - crlf;
    LineEndings {
        lf,
        crlf,
        final_newline: text.is_empty() || text.ends_with('\n'),
    }
}
