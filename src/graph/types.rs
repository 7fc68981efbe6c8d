//! Core types for the Tether model.
//!
//! `ScriptRecord` is the per-file structural snapshot produced by the
//! indexer; `NodeData` / `EdgeData` are the weights stored in the module
//! and call graphs built from those records.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// The kind of a node in the module or call graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// A script file (module graph).
    File,
    /// The top-level statements of a script (call graph).
    TopLevel,
    /// A function definition (call graph).
    Function,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::File => write!(f, "file"),
            NodeKind::TopLevel => write!(f, "top_level"),
            NodeKind::Function => write!(f, "function"),
        }
    }
}

/// The kind of an edge in the module or call graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// File sources another file (File -> File).
    Includes,
    /// Caller invokes a function (TopLevel/Function -> Function).
    Calls,
    /// A `trap` registers a function as a handler.
    Handles,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeKind::Includes => write!(f, "includes"),
            EdgeKind::Calls => write!(f, "calls"),
            EdgeKind::Handles => write!(f, "handles"),
        }
    }
}

/// Data stored in a graph node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeData {
    pub kind: NodeKind,
    /// Function name; empty for file and top-level nodes.
    pub name: String,
    /// Root-relative path of the file the node belongs to.
    pub file: String,
    /// Definition line (1-indexed); 0 for file and top-level nodes.
    pub line: usize,
}

impl NodeData {
    pub fn new_file(file: &str) -> Self {
        Self {
            kind: NodeKind::File,
            name: String::new(),
            file: file.to_string(),
            line: 0,
        }
    }

    pub fn new_top_level(file: &str) -> Self {
        Self {
            kind: NodeKind::TopLevel,
            name: String::new(),
            file: file.to_string(),
            line: 0,
        }
    }

    pub fn new_function(file: &str, name: &str, line: usize) -> Self {
        Self {
            kind: NodeKind::Function,
            name: name.to_string(),
            file: file.to_string(),
            line,
        }
    }

    /// Human-readable label: `file` or `file::name`.
    pub fn label(&self) -> String {
        match self.kind {
            NodeKind::File => self.file.clone(),
            NodeKind::TopLevel => format!("{}::<top>", self.file),
            NodeKind::Function => format!("{}::{}", self.file, self.name),
        }
    }
}

/// Data stored on a graph edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeData {
    pub kind: EdgeKind,
    /// Line of the include statement or call site.
    pub line: usize,
}

impl EdgeData {
    pub fn new(kind: EdgeKind, line: usize) -> Self {
        Self { kind, line }
    }
}

// ─── Script Records ───────────────────────────────────────────────────────────

/// How a script participates in the corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Unknown,
    Entry,
    Library,
    Ambiguous,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Unknown => write!(f, "unknown"),
            Role::Entry => write!(f, "entry"),
            Role::Library => write!(f, "library"),
            Role::Ambiguous => write!(f, "ambiguous"),
        }
    }
}

/// Where an include statement points, before resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum IncludeTarget {
    /// `source "${BASE}/name"`: a module in the library directory.
    Module(String),
    /// A literal path, relative to the including file or absolute.
    Path(String),
    /// A template the indexer could not resolve; kept verbatim.
    Unresolved(String),
}

/// A `source` / `.` statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncludeRef {
    /// The target text exactly as written (quotes removed).
    pub raw: String,
    pub target: IncludeTarget,
    /// Line of the statement (1-indexed).
    pub line: usize,
    pub needs_manual_review: bool,
    /// Variable substituted to reach the target, if any.
    pub via: Option<String>,
    /// The whole statement line, trimmed.
    pub statement: String,
    /// True when the line holds nothing but this statement.
    pub standalone: bool,
}

/// A function definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub line_start: usize,
    pub line_end: usize,
    /// Leading doc comment, without `#` markers.
    pub doc: Option<String>,
    /// Listed in the file's function index.
    pub in_manifest: bool,
    /// A later definition of the same name exists in this file.
    pub shadowed: bool,
}

impl FunctionDef {
    pub fn contains_line(&self, line: usize) -> bool {
        line >= self.line_start && line <= self.line_end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    /// Identifier in command position.
    Command,
    /// Handler registered with `trap`.
    Trap,
}

/// A call site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSite {
    pub callee: String,
    pub line: usize,
    /// Enclosing function; `None` at top level.
    pub caller: Option<String>,
    /// First line of the enclosing definition.
    pub caller_line: Option<usize>,
    pub kind: CallKind,
}

/// A top-level assignment to an upper-case global.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalVar {
    pub name: String,
    pub line: usize,
    pub exported: bool,
}

/// A `$NAME` / `${NAME}` expansion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarRef {
    pub name: String,
    pub line: usize,
}

/// Line terminator statistics for a file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineEndings {
    pub lf: usize,
    pub crlf: usize,
    /// The last line ends with a terminator.
    pub final_newline: bool,
}

impl LineEndings {
    pub fn has_crlf(&self) -> bool {
        self.crlf > 0
    }

    /// Terminator new lines should use: CRLF only for files that use it
    /// exclusively.
    pub fn preferred(&self) -> &'static str {
        if self.crlf > 0 && self.lf == 0 {
            "\r\n"
        } else {
            "\n"
        }
    }
}

/// The declared function index block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestBlock {
    /// Marker line (1-indexed).
    pub marker_line: usize,
    /// Last line of the block, terminator included (1-indexed).
    pub last_line: usize,
    /// Declared names in order.
    pub entries: Vec<String>,
}

/// Metadata from the leading comment block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderInfo {
    /// Number of header lines; the header is lines `1..=len`.
    pub len: usize,
    pub has_shebang: bool,
    /// Meaningful description lines.
    pub description: Vec<String>,
    pub has_usage: bool,
    pub has_example: bool,
    pub manifest: Option<ManifestBlock>,
}

/// Everything the indexer extracted from one script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRecord {
    /// Absolute path on disk.
    pub path: PathBuf,
    /// Root-relative path with `/` separators; the canonical key.
    pub rel_path: String,
    /// The text the record was built from.
    pub text: String,
    pub header: HeaderInfo,
    pub includes: Vec<IncludeRef>,
    pub functions: Vec<FunctionDef>,
    pub calls: Vec<CallSite>,
    pub globals: Vec<GlobalVar>,
    pub var_refs: Vec<VarRef>,
    /// Identifier-like words seen in argument position.
    pub arg_words: Vec<String>,
    /// Lines with a command word built from an expansion, or `eval`.
    pub dynamic_calls: Vec<usize>,
    /// Commands other than declarations run outside any function.
    pub top_level_code: bool,
    pub line_endings: LineEndings,
}

impl ScriptRecord {
    /// Authoritative (last) definition of each name, in file order.
    pub fn authoritative_functions(&self) -> impl Iterator<Item = &FunctionDef> {
        self.functions.iter().filter(|f| !f.shadowed)
    }

    pub fn defines(&self, name: &str) -> bool {
        self.functions.iter().any(|f| f.name == name)
    }

    /// True when the definition starting at `line_start` is overridden by a
    /// later one, so its body never runs.
    pub fn is_shadowed_at(&self, line_start: usize) -> bool {
        self.functions
            .iter()
            .any(|f| f.line_start == line_start && f.shadowed)
    }

    /// Innermost function whose body contains `line`, shadowed ones included.
    pub fn function_at(&self, line: usize) -> Option<&FunctionDef> {
        self.functions
            .iter()
            .filter(|f| f.contains_line(line))
            .min_by_key(|f| f.line_end - f.line_start)
    }

    /// Lines of the snapshot without terminators.
    pub fn lines(&self) -> Vec<&str> {
        self.text
            .split_inclusive('\n')
            .map(|l| l.trim_end_matches('\n').trim_end_matches('\r'))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_labels() {
        assert_eq!(NodeData::new_file("lib.sh").label(), "lib.sh");
        assert_eq!(NodeData::new_top_level("a.sh").label(), "a.sh::<top>");
        assert_eq!(
            NodeData::new_function("Utilities/x.sh", "__x__", 4).label(),
            "Utilities/x.sh::__x__"
        );
    }

    #[test]
    fn test_preferred_line_ending() {
        let mixed = LineEndings {
            lf: 2,
            crlf: 1,
            final_newline: true,
        };
        assert_eq!(mixed.preferred(), "\n");
        let dos = LineEndings {
            lf: 0,
            crlf: 4,
            final_newline: true,
        };
        assert_eq!(dos.preferred(), "\r\n");
        assert!(dos.has_crlf());
    }
}
