//! Leading comment block: description, usage/example sections and the
//! function index manifest.

use crate::error::ParseError;
use crate::graph::types::{HeaderInfo, ManifestBlock};

use super::lexer::is_identifier;

/// Read the header of a script whose lines are `lines` (terminators removed).
///
/// The header is the run of lines from the top whose first non-blank
/// character is `#`. `marker` is the manifest marker text, matched
/// case-insensitively after the leading `#`.
pub fn read_header(lines: &[&str], marker: &str) -> Result<HeaderInfo, ParseError> {
    let len = lines
        .iter()
        .take_while(|l| l.trim_start().starts_with('#'))
        .count();
    let mut info = HeaderInfo {
        len,
        has_shebang: lines.first().is_some_and(|l| l.starts_with("#!")),
        ..HeaderInfo::default()
    };

    let marker = marker.trim().to_lowercase();
    let mut idx = 0;
    while idx < len {
        let line_no = idx + 1;
        let body = comment_body(lines[idx]);
        let lowered = body.to_lowercase();

        if !marker.is_empty() && lowered.starts_with(&marker) {
            if let Some(existing) = &info.manifest {
                return Err(ParseError::DuplicateManifest {
                    first: existing.marker_line,
                    second: line_no,
                });
            }
            let block = read_manifest(lines, idx, len);
            idx = block.last_line;
            info.manifest = Some(block);
            continue;
        }

        if idx == 0 && info.has_shebang {
            idx += 1;
            continue;
        }
        if lowered.starts_with("usage:") {
            info.has_usage = true;
        } else if lowered.starts_with("example:") || lowered.starts_with("examples:") {
            info.has_example = true;
        } else if is_meaningful(body) {
            info.description.push(body.to_string());
        }
        idx += 1;
    }
    Ok(info)
}

/// Parse the manifest whose marker sits at index `start`.
fn read_manifest(lines: &[&str], start: usize, header_len: usize) -> ManifestBlock {
    let mut entries = Vec::new();
    let mut idx = start + 1;
    while idx < header_len {
        match bullet_name(lines[idx]) {
            Some(name) => {
                entries.push(name.to_string());
                idx += 1;
            }
            None => break,
        }
    }
    // A bare `#` right after the bullets closes the block.
    if idx < header_len && lines[idx].trim() == "#" {
        idx += 1;
    }
    ManifestBlock {
        marker_line: start + 1,
        last_line: idx,
        entries,
    }
}

/// `#   - name` or `# * name`.
fn bullet_name(line: &str) -> Option<&str> {
    let body = comment_body(line);
    let rest = body
        .strip_prefix('-')
        .or_else(|| body.strip_prefix('*'))?
        .trim();
    is_identifier(rest).then_some(rest)
}

/// Text of a comment line after the leading `#` characters, trimmed.
pub fn comment_body(line: &str) -> &str {
    line.trim_start().trim_start_matches('#').trim()
}

/// Separator-only comments like `# ------` or `#####`.
pub fn is_separator(body: &str) -> bool {
    !body.is_empty() && body.chars().all(|c| "-=*#+_~".contains(c) || c.is_whitespace())
}

fn is_meaningful(body: &str) -> bool {
    body.chars().filter(|c| !c.is_whitespace()).count() > 3 && !is_separator(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<&str> {
        text.lines().collect()
    }

    #[test]
    fn test_header_sections() {
        let text = "#!/bin/bash\n\
                    #\n\
                    # BulkStart.sh\n\
                    # Starts every VM in a range.\n\
                    # ------------------------------\n\
                    # Usage:\n\
                    #   BulkStart.sh <first> <last>\n\
                    # Example:\n\
                    #   BulkStart.sh 100 110\n\
                    \n\
                    main() { :; }\n";
        let info = read_header(&lines(text), "Function Index:").unwrap();
        assert_eq!(info.len, 9);
        assert!(info.has_shebang);
        assert!(info.has_usage);
        assert!(info.has_example);
        assert!(info.manifest.is_none());
        assert!(info.description.contains(&"Starts every VM in a range.".to_string()));
        assert!(!info.description.iter().any(|l| l.starts_with("---")));
    }

    #[test]
    fn test_manifest_block() {
        let text = "#!/bin/bash\n\
                    # Library of prompts.\n\
                    #\n\
                    # Function Index:\n\
                    #   - __prompt_yes_no__\n\
                    #   - __install_or_prompt__\n\
                    #\n\
                    \n\
                    __prompt_yes_no__() { :; }\n";
        let info = read_header(&lines(text), "Function Index:").unwrap();
        let block = info.manifest.unwrap();
        assert_eq!(block.marker_line, 4);
        assert_eq!(block.last_line, 7);
        assert_eq!(
            block.entries,
            vec!["__prompt_yes_no__", "__install_or_prompt__"]
        );
    }

    #[test]
    fn test_manifest_without_terminator() {
        let text = "# function index:\n# * one\n# - two\n# Notes: more text\n";
        let block = read_header(&lines(text), "Function Index:")
            .unwrap()
            .manifest
            .unwrap();
        assert_eq!(block.entries, vec!["one", "two"]);
        assert_eq!(block.last_line, 3);
    }

    #[test]
    fn test_duplicate_manifest() {
        let text = "# Function Index:\n#   - a\n#\n# Function Index:\n#   - b\n";
        let err = read_header(&lines(text), "Function Index:").unwrap_err();
        assert_eq!(err, ParseError::DuplicateManifest { first: 1, second: 4 });
    }

    #[test]
    fn test_marker_outside_header_is_ignored() {
        let text = "echo hi\n# Function Index:\n#   - a\n";
        let info = read_header(&lines(text), "Function Index:").unwrap();
        assert_eq!(info.len, 0);
        assert!(info.manifest.is_none());
    }

    #[test]
    fn test_separator() {
        assert!(is_separator("-----"));
        assert!(is_separator("= = = ="));
        assert!(!is_separator("Starts a VM"));
        assert!(!is_separator(""));
    }
}
