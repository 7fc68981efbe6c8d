//! Tether configuration.
//!
//! Loaded from `.tether.toml` in the scanned root. Every field has a
//! default, so a partial file (or no file) is fine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::error::ConfigError;

/// Name of the per-project config file looked up in the scan root.
pub const CONFIG_FILE_NAME: &str = ".tether.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TetherConfig {
    pub scan: ScanConfig,
    pub includes: IncludeConfig,
    pub calls: CallConfig,
    pub entry: EntryConfig,
    pub dead_code: DeadCodeConfig,
    pub index: IndexConfig,
    pub docs: DocsConfig,
    pub notes: NotesConfig,
    pub logging: LoggingConfig,
    pub error_handling: ErrorHandlingConfig,
    pub engine: EngineConfig,
}

/// Which files are part of the corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// File extensions treated as shell scripts.
    pub extensions: Vec<String>,
    /// Directory names never descended into.
    pub skip_dirs: Vec<String>,
    /// Also index extensionless files whose shebang names a shell.
    pub shebang_detection: bool,
    /// Worker threads for indexing. 0 = number of CPUs.
    pub threads: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["sh".into(), "bash".into()],
            skip_dirs: [".git", ".github", ".site", ".check", ".docs"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            shebang_detection: true,
            threads: 0,
        }
    }
}

/// The base-path convention used to resolve `source` statements.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IncludeConfig {
    /// Variable that points at the library directory at runtime.
    pub base_var: String,
    /// Library directory, relative to the scan root.
    pub library_dir: String,
}

impl Default for IncludeConfig {
    fn default() -> Self {
        Self {
            base_var: "UTILITYPATH".into(),
            library_dir: "Utilities".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CallConfig {
    /// Extra command names treated as external (never "unresolved").
    pub external_commands: Vec<String>,
    /// Call names ignored entirely.
    pub ignored: Vec<String>,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            external_commands: Vec::new(),
            ignored: vec!["__base__".into()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryConfig {
    /// Function names whose top-level invocation marks a file as an entry.
    pub main_functions: Vec<String>,
}

impl Default for EntryConfig {
    fn default() -> Self {
        Self {
            main_functions: vec!["main".into(), "__main__".into()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeadCodeConfig {
    /// Doc-comment phrases that exempt a function from dead-code reports.
    pub reserved_markers: Vec<String>,
    /// Globals never reported as unreached.
    pub ignored_globals: Vec<String>,
}

impl Default for DeadCodeConfig {
    fn default() -> Self {
        Self {
            reserved_markers: vec!["reserved for future use".into(), "@reserved".into()],
            ignored_globals: ["UTILITYPATH", "SCRIPTPATH", "PATH", "HOME"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Text of the manifest marker line, after the leading `# `.
    pub marker: String,
    /// Leave `_helper` style functions out of the manifest.
    pub exclude_private: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            marker: "Function Index:".into(),
            exclude_private: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocsConfig {
    /// Meaningful header lines needed to count as a description.
    pub min_description_lines: usize,
    pub require_usage: bool,
    /// Only enforced when running with `strict`.
    pub require_example_in_strict: bool,
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            min_description_lines: 1,
            require_usage: true,
            require_example_in_strict: true,
        }
    }
}

/// The trailing `# Script notes:` block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotesConfig {
    pub marker: String,
    /// Section headings every block must carry, in order.
    pub sections: Vec<String>,
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            marker: "Script notes:".into(),
            sections: vec!["Changes:".into(), "Fixes:".into(), "Known issues:".into()],
        }
    }
}

/// Per-module log functions every library function is expected to call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Module file name inside the library directory -> log function.
    pub functions: BTreeMap<String, String>,
    /// Functions exempt from the check.
    pub excluded: Vec<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let functions = [
            ("ArgumentParser.sh", "__argparser_log__"),
            ("BulkOperations.sh", "__bulk_log__"),
            ("Colors.sh", "__color_log__"),
            ("Communication.sh", "__comm_log__"),
            ("Conversion.sh", "__convert_log__"),
            ("Network.sh", "__net_log__"),
            ("Prompts.sh", "__prompt_log__"),
            ("Operations.sh", "__api_log__"),
            ("Cluster.sh", "__query_log__"),
            ("RemoteExecution.sh", "__remoteexec_log__"),
            ("SSH.sh", "__ssh_log__"),
            ("StateManager.sh", "__state_log__"),
        ]
        .iter()
        .map(|(module, func)| (module.to_string(), func.to_string()))
        .collect();
        Self {
            functions,
            excluded: vec!["vm_wrapper".into(), "ct_wrapper".into()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorHandlingConfig {
    /// Commands whose failure must be checked when `set -e` is not in effect.
    pub critical_commands: Vec<String>,
    /// Functions longer than this must `return` or `exit` explicitly (strict).
    pub max_implicit_return_lines: usize,
}

impl Default for ErrorHandlingConfig {
    fn default() -> Self {
        Self {
            critical_commands: [
                "rm", "mv", "cp", "dd", "mkfs", "fdisk", "parted", "apt-get", "apt", "yum",
                "dnf", "systemctl", "pvecm", "pvesh", "qm", "pct", "curl", "wget", "git",
                "rsync",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            max_implicit_return_lines: 5,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Build the model a second time from reversed input and compare.
    pub self_check: bool,
}

impl TetherConfig {
    /// Load config from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text).map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Load `.tether.toml` from a scan root.
    pub fn load_from_root(root: &Path) -> Result<Self, ConfigError> {
        Self::load(&root.join(CONFIG_FILE_NAME))
    }

    pub fn from_toml(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TetherConfig::default();
        assert_eq!(config.includes.base_var, "UTILITYPATH");
        assert_eq!(config.includes.library_dir, "Utilities");
        assert!(config.scan.skip_dirs.contains(&".git".to_string()));
        assert!(config.index.exclude_private);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = TetherConfig::from_toml(
            r#"
[includes]
library_dir = "lib"

[calls]
external_commands = ["pvesh", "qm"]
"#,
        )
        .unwrap();
        assert_eq!(config.includes.library_dir, "lib");
        assert_eq!(config.includes.base_var, "UTILITYPATH");
        assert_eq!(config.calls.external_commands, vec!["pvesh", "qm"]);
        assert_eq!(config.calls.ignored, vec!["__base__"]);
    }

    #[test]
    fn test_logging_map_from_toml() {
        let config = TetherConfig::from_toml(
            r#"
[logging.functions]
"Storage.sh" = "__storage_log__"
"#,
        )
        .unwrap();
        assert_eq!(config.logging.functions.len(), 1);
        assert_eq!(config.logging.functions["Storage.sh"], "__storage_log__");
        assert_eq!(config.logging.excluded, vec!["vm_wrapper", "ct_wrapper"]);
        assert_eq!(config.notes.sections.len(), 3);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(TetherConfig::from_toml("[scan\nthreads = ").is_err());
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = TetherConfig::load_from_root(dir.path()).unwrap();
        assert_eq!(config.index.marker, "Function Index:");
    }
}
