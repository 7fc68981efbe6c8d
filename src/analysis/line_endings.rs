//! CRLF detection. The fix rewrites every terminator to LF.

use super::{Fix, Proposal};
use crate::finding::{Category, Finding};
use crate::graph::Model;

pub fn run(model: &Model) -> Vec<Proposal> {
    model
        .records
        .iter()
        .filter(|r| r.line_endings.has_crlf())
        .map(|r| {
            let endings = r.line_endings;
            let message = if endings.lf == 0 {
                "file uses CRLF line endings".to_string()
            } else {
                format!(
                    "mixed line endings: {} CRLF, {} LF",
                    endings.crlf, endings.lf
                )
            };
            let first = r.text.find("\r\n").map(|pos| r.text[..pos].matches('\n').count() + 1);
            Proposal {
                finding: Finding::new(Category::LineEndings, &r.rel_path, first, message),
                fix: Fix::NormalizeLineEndings,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TetherConfig;
    use crate::parser::{index_source, IndexContext};
    use std::path::Path;

    #[test]
    fn test_crlf_files_are_reported() {
        let ctx = IndexContext::default();
        let dos = index_source(Path::new("/c/dos.sh"), "dos.sh", "echo a\r\necho b\r\n", &ctx).unwrap();
        let mixed = index_source(Path::new("/c/mix.sh"), "mix.sh", "echo a\necho b\r\n", &ctx).unwrap();
        let unix = index_source(Path::new("/c/unix.sh"), "unix.sh", "echo a\n", &ctx).unwrap();
        let model = Model::build(vec![dos, mixed, unix], Path::new("/c"), &TetherConfig::default());

        let proposals = run(&model);
        assert_eq!(proposals.len(), 2);
        assert_eq!(proposals[0].finding.file, "dos.sh");
        assert_eq!(proposals[0].finding.line, Some(1));
        assert_eq!(proposals[0].fix, Fix::NormalizeLineEndings);
        assert_eq!(proposals[1].finding.message, "mixed line endings: 1 CRLF, 1 LF");
        assert_eq!(proposals[1].finding.line, Some(2));
    }
}
