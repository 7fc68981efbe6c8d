//! Fix transactions: line edits applied against one text snapshot.
//!
//! All edits for a file are collected into a single `Transaction`, checked
//! for conflicts, applied in one pass, reverified by the engine and only
//! then written (atomically: temp file in the same directory, renamed over
//! the original).

use std::fmt::Write as FmtWrite;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::FixError;
use crate::finding::Category;

/// Replace lines `start..end` (0-indexed, half-open) with `lines`.
/// `start == end` inserts before line `start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineEdit {
    pub start: usize,
    pub end: usize,
    /// Replacement lines, without terminators.
    pub lines: Vec<String>,
    pub category: Category,
}

impl LineEdit {
    pub fn replace(start: usize, end: usize, lines: Vec<String>, category: Category) -> Self {
        Self {
            start,
            end,
            lines,
            category,
        }
    }

    pub fn insert(at: usize, lines: Vec<String>, category: Category) -> Self {
        Self::replace(at, at, lines, category)
    }

    pub fn delete(start: usize, end: usize, category: Category) -> Self {
        Self::replace(start, end, Vec::new(), category)
    }

    pub fn is_insertion(&self) -> bool {
        self.start == self.end
    }

    fn describe(&self) -> String {
        format!("{} at lines {}..{}", self.category, self.start, self.end)
    }

    fn conflicts_with(&self, other: &LineEdit) -> bool {
        match (self.is_insertion(), other.is_insertion()) {
            (true, true) => self.start == other.start && self.category == other.category,
            (true, false) => other.start < self.start && self.start < other.end,
            (false, true) => self.start < other.start && other.start < self.end,
            (false, false) => self.start < other.end && other.start < self.end,
        }
    }
}

/// Where a file is in the fix pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Scanned,
    Clean,
    FindingsComputed,
    Edited,
    Reverified,
    Written,
}

/// Pending edits for one file.
#[derive(Debug, Clone)]
pub struct Transaction {
    rel_path: String,
    snapshot: String,
    edits: Vec<LineEdit>,
    normalize: bool,
    state: TxState,
    output: Option<String>,
}

impl Transaction {
    pub fn new(rel_path: &str, snapshot: &str) -> Self {
        Self {
            rel_path: rel_path.to_string(),
            snapshot: snapshot.to_string(),
            edits: Vec::new(),
            normalize: false,
            state: TxState::Scanned,
            output: None,
        }
    }

    pub fn rel_path(&self) -> &str {
        &self.rel_path
    }

    pub fn state(&self) -> TxState {
        self.state
    }

    pub fn edits(&self) -> &[LineEdit] {
        &self.edits
    }

    pub fn normalizes(&self) -> bool {
        self.normalize
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty() && !self.normalize
    }

    /// Categories that contributed edits.
    pub fn categories(&self) -> Vec<Category> {
        let mut cats: Vec<Category> = self.edits.iter().map(|e| e.category).collect();
        if self.normalize {
            cats.push(Category::LineEndings);
        }
        cats.sort();
        cats.dedup();
        cats
    }

    pub fn push(&mut self, edit: LineEdit) {
        self.edits.push(edit);
        self.state = TxState::FindingsComputed;
    }

    /// Rewrite every terminator to LF.
    pub fn normalize_line_endings(&mut self) {
        self.normalize = true;
        self.state = TxState::FindingsComputed;
    }

    /// Apply all edits to the snapshot and return the new text.
    pub fn apply(&mut self) -> Result<String, FixError> {
        if self.is_empty() {
            self.state = TxState::Clean;
            return Ok(self.snapshot.clone());
        }

        let mut lines = split_lines(&self.snapshot);
        let len = lines.len();
        for edit in &self.edits {
            if edit.start > edit.end || edit.end > len {
                return Err(FixError::OutOfBounds {
                    start: edit.start,
                    end: edit.end,
                    len,
                });
            }
        }
        for (i, a) in self.edits.iter().enumerate() {
            for b in &self.edits[i + 1..] {
                if a.conflicts_with(b) {
                    return Err(FixError::Conflict {
                        first: a.describe(),
                        second: b.describe(),
                    });
                }
            }
        }

        let ending = if self.normalize {
            "\n"
        } else {
            preferred_ending(&self.snapshot)
        };

        // Descending; at equal starts the replaced range goes first so an
        // insertion at its start ends up before it. Insertions sharing a
        // point land in category order.
        let mut ordered: Vec<&LineEdit> = self.edits.iter().collect();
        ordered.sort_by(|a, b| {
            b.start
                .cmp(&a.start)
                .then(a.is_insertion().cmp(&b.is_insertion()))
                .then(b.category.cmp(&a.category))
        });
        for edit in ordered {
            if edit.start == lines.len() {
                if let Some(last) = lines.last_mut() {
                    if last.1.is_empty() && !edit.lines.is_empty() {
                        last.1 = ending.to_string();
                    }
                }
            }
            let replacement = edit
                .lines
                .iter()
                .map(|l| (l.clone(), ending.to_string()));
            lines.splice(edit.start..edit.end, replacement);
        }

        let mut out = String::with_capacity(self.snapshot.len());
        for (content, terminator) in &lines {
            out.push_str(content);
            if self.normalize && !terminator.is_empty() {
                out.push('\n');
            } else {
                out.push_str(terminator);
            }
        }

        debug!(file = %self.rel_path, edits = self.edits.len(), normalize = self.normalize, "edits applied");
        self.state = TxState::Edited;
        self.output = Some(out.clone());
        Ok(out)
    }

    /// Record that re-analysis of the applied text proposed nothing new.
    pub fn mark_reverified(&mut self) {
        if self.state == TxState::Edited {
            self.state = TxState::Reverified;
        }
    }

    /// Unified-style diff of the applied edits. Empty before `apply`.
    pub fn diff(&self) -> String {
        if self.output.is_none() || self.is_empty() {
            return String::new();
        }
        let old = split_lines(&self.snapshot);
        let mut out = String::new();
        let _ = writeln!(out, "--- a/{}", self.rel_path);
        let _ = writeln!(out, "+++ b/{}", self.rel_path);
        if self.normalize {
            let _ = writeln!(out, "# line endings: CRLF -> LF");
        }

        let mut ordered: Vec<&LineEdit> = self.edits.iter().collect();
        ordered.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then(b.is_insertion().cmp(&a.is_insertion()))
                .then(a.category.cmp(&b.category))
        });
        let mut offset: isize = 0;
        for edit in ordered {
            let old_len = edit.end - edit.start;
            let new_len = edit.lines.len();
            let new_start = edit.start as isize + offset;
            let old_pos = if old_len == 0 { edit.start } else { edit.start + 1 };
            let new_pos = if new_len == 0 { new_start } else { new_start + 1 };
            let _ = writeln!(out, "@@ -{},{} +{},{} @@", old_pos, old_len, new_pos, new_len);
            for (content, _) in &old[edit.start..edit.end] {
                let _ = writeln!(out, "-{}", content);
            }
            for line in &edit.lines {
                let _ = writeln!(out, "+{}", line);
            }
            offset += new_len as isize - old_len as isize;
        }
        out
    }

    /// Atomically replace `path` with the applied text.
    pub fn commit(&mut self, path: &Path) -> Result<(), FixError> {
        let (TxState::Reverified, Some(output)) = (self.state, self.output.as_ref()) else {
            return Err(FixError::Unverified(self.rel_path.clone()));
        };
        let write_err = |source| FixError::Write {
            path: path.to_path_buf(),
            source,
        };
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(output.as_bytes()).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        if let Ok(meta) = fs::metadata(path) {
            fs::set_permissions(tmp.path(), meta.permissions()).map_err(write_err)?;
        }
        tmp.persist(path).map_err(|e| write_err(e.error))?;
        debug!(file = %self.rel_path, "written");
        self.state = TxState::Written;
        Ok(())
    }
}

/// Lines with their terminators (`"\n"`, `"\r\n"` or `""` for a final
/// unterminated line).
fn split_lines(text: &str) -> Vec<(String, String)> {
    text.split_inclusive('\n')
        .map(|line| {
            if let Some(content) = line.strip_suffix("\r\n") {
                (content.to_string(), "\r\n".to_string())
            } else if let Some(content) = line.strip_suffix('\n') {
                (content.to_string(), "\n".to_string())
            } else {
                (line.to_string(), String::new())
            }
        })
        .collect()
}

fn preferred_ending(text: &str) -> &'static str {
    let crlf = text.matches("\r\n").count();
    let lf = text.matches('\n').count() - crlf;
    if crlf > 0 && lf == 0 {
        "\r\n"
    } else {
        "\n"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lines(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_replace_and_insert() {
        let mut tx = Transaction::new("a.sh", "one\ntwo\nthree\n");
        tx.push(LineEdit::replace(1, 2, lines(&["TWO"]), Category::FunctionIndex));
        tx.push(LineEdit::insert(0, lines(&["zero"]), Category::MissingInclude));
        assert_eq!(tx.apply().unwrap(), "zero\none\nTWO\nthree\n");
        assert_eq!(tx.state(), TxState::Edited);
    }

    #[test]
    fn test_insertion_at_range_start_goes_first() {
        let mut tx = Transaction::new("a.sh", "a\nb\nc\n");
        tx.push(LineEdit::replace(1, 2, lines(&["B"]), Category::FunctionIndex));
        tx.push(LineEdit::insert(1, lines(&["new"]), Category::MissingInclude));
        assert_eq!(tx.apply().unwrap(), "a\nnew\nB\nc\n");
    }

    #[test]
    fn test_conflicts() {
        let mut tx = Transaction::new("a.sh", "a\nb\nc\nd\n");
        tx.push(LineEdit::replace(0, 2, lines(&["x"]), Category::FunctionIndex));
        tx.push(LineEdit::delete(1, 3, Category::UnusedInclude));
        assert!(matches!(tx.apply(), Err(FixError::Conflict { .. })));

        let mut tx = Transaction::new("a.sh", "a\nb\nc\n");
        tx.push(LineEdit::replace(0, 3, lines(&["x"]), Category::FunctionIndex));
        tx.push(LineEdit::insert(1, lines(&["y"]), Category::MissingInclude));
        assert!(matches!(tx.apply(), Err(FixError::Conflict { .. })));

        let mut tx = Transaction::new("a.sh", "a\n");
        tx.push(LineEdit::insert(1, lines(&["y"]), Category::MissingInclude));
        tx.push(LineEdit::insert(1, lines(&["z"]), Category::MissingInclude));
        assert!(matches!(tx.apply(), Err(FixError::Conflict { .. })));
    }

    #[test]
    fn test_shared_insertion_point_orders_by_category() {
        let mut tx = Transaction::new("a.sh", "#!/bin/bash\n# Lib.\n\nf() { :; }\n");
        tx.push(LineEdit::insert(2, lines(&["source ./x.sh"]), Category::MissingInclude));
        tx.push(LineEdit::insert(
            2,
            lines(&["# Function Index:", "#   - f", "#"]),
            Category::FunctionIndex,
        ));
        assert_eq!(
            tx.apply().unwrap(),
            "#!/bin/bash\n# Lib.\n# Function Index:\n#   - f\n#\nsource ./x.sh\n\nf() { :; }\n"
        );
        assert!(tx.diff().contains("@@ -2,0 +3,3 @@\n"));
        assert!(tx.diff().contains("@@ -2,0 +6,1 @@\n"));
    }

    #[test]
    fn test_out_of_bounds() {
        let mut tx = Transaction::new("a.sh", "a\n");
        tx.push(LineEdit::delete(0, 5, Category::UnusedInclude));
        assert!(matches!(tx.apply(), Err(FixError::OutOfBounds { .. })));
    }

    #[test]
    fn test_crlf_file_keeps_crlf() {
        let mut tx = Transaction::new("a.sh", "a\r\nb\r\n");
        tx.push(LineEdit::insert(1, lines(&["x"]), Category::MissingInclude));
        assert_eq!(tx.apply().unwrap(), "a\r\nx\r\nb\r\n");
    }

    #[test]
    fn test_normalize() {
        let mut tx = Transaction::new("a.sh", "a\r\nb\nc");
        tx.normalize_line_endings();
        assert_eq!(tx.apply().unwrap(), "a\nb\nc");
        assert!(tx.diff().contains("CRLF -> LF"));
    }

    #[test]
    fn test_append_to_unterminated_file() {
        let mut tx = Transaction::new("a.sh", "a\nb");
        tx.push(LineEdit::insert(2, lines(&["c"]), Category::FunctionIndex));
        assert_eq!(tx.apply().unwrap(), "a\nb\nc\n");
    }

    #[test]
    fn test_clean_transaction() {
        let mut tx = Transaction::new("a.sh", "a\n");
        assert_eq!(tx.apply().unwrap(), "a\n");
        assert_eq!(tx.state(), TxState::Clean);
        assert!(tx.diff().is_empty());
    }

    #[test]
    fn test_diff() {
        let mut tx = Transaction::new("lib.sh", "# head\nsource x\nbody\n");
        tx.push(LineEdit::delete(1, 2, Category::UnusedInclude));
        tx.push(LineEdit::insert(1, lines(&["# - f", "#"]), Category::FunctionIndex));
        tx.apply().unwrap();
        assert_eq!(
            tx.diff(),
            "--- a/lib.sh\n\
             +++ b/lib.sh\n\
             @@ -1,0 +2,2 @@\n\
             +# - f\n\
             +#\n\
             @@ -2,1 +3,0 @@\n\
             -source x\n"
        );
    }

    #[test]
    fn test_commit_requires_reverification() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.sh");
        fs::write(&path, "a\n").unwrap();

        let mut tx = Transaction::new("a.sh", "a\n");
        tx.push(LineEdit::insert(1, lines(&["b"]), Category::FunctionIndex));
        tx.apply().unwrap();
        assert!(matches!(tx.commit(&path), Err(FixError::Unverified(_))));

        tx.mark_reverified();
        tx.commit(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "a\nb\n");
        assert_eq!(tx.state(), TxState::Written);
    }
}
