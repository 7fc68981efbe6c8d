//! # Tether
//!
//! Static analysis and idempotent auto-fix for shell script corpora.
//!
//! Tether indexes every script under a root, builds the include graph and
//! the function call graph once, and runs analyses over that shared model:
//!
//! - **Cycles**: circular `source` chains (Tarjan SCC)
//! - **Dead code**: functions and globals no entry script can reach
//! - **Function index**: the `# Function Index:` header block
//! - **Source calls**: missing and unused `source` statements
//! - **Line endings** and **documentation** hygiene
//!
//! Fixes for one file are merged into a single transaction, re-analyzed
//! before anything is written, and written atomically.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tether::{run, CheckOptions, Mode};
//!
//! let report = run(&CheckOptions::new(".").with_mode(Mode::Fix))?;
//! println!("{}", tether::report::render_text(&report, Default::default()));
//! std::process::exit(report.exit_code());
//! # Ok::<(), tether::TetherError>(())
//! ```

pub mod analysis;
pub mod check;
pub mod cli;
pub mod config;
pub mod error;
pub mod finding;
pub mod fix;
pub mod graph;
pub mod parser;
pub mod report;

// Re-exports for convenience
pub use error::{ConfigError, FixError, ParseError, Result, TetherError};

pub use analysis::{Analysis, AnalysisSet};
pub use check::{build_model, run, CheckOptions, ConfigSource, FileFix, Mode, RunReport};
pub use config::TetherConfig;
pub use finding::{Category, Finding, Severity};
pub use graph::{scan, Model, Role, ScriptRecord};
pub use parser::{index_source, IndexContext, ShellDialect};

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use std::path::Path;

    #[test]
    fn test_index_realistic_script() {
        let source = indoc! {r#"
            #!/bin/bash
            #
            # BulkStart.sh
            #
            # Starts every VM in a range.
            #
            # Usage:
            #   BulkStart.sh <first> <last>
            #
            # Function Index:
            #   - start_range
            #

            source "${UTILITYPATH}/Prompts.sh"
            source "${UTILITYPATH}/Queries.sh"

            # Start VMs first..last.
            start_range() {
              local vmid
              for vmid in $(seq "$1" "$2"); do
                __vm_start__ "$vmid" || echo "failed $vmid"
              done
            }

            __check_root__
            start_range "$@"
        "#};
        let record = index_source(
            Path::new("/corpus/VirtualMachines/BulkStart.sh"),
            "VirtualMachines/BulkStart.sh",
            source,
            &IndexContext::default(),
        )
        .unwrap();

        assert!(record.header.has_usage);
        assert_eq!(
            record.header.manifest.as_ref().map(|m| m.entries.clone()),
            Some(vec!["start_range".to_string()])
        );
        assert_eq!(record.includes.len(), 2);
        assert_eq!(record.functions.len(), 1);
        assert_eq!(record.functions[0].doc.as_deref(), Some("Start VMs first..last."));
        let callees: Vec<&str> = record.calls.iter().map(|c| c.callee.as_str()).collect();
        assert!(callees.contains(&"__vm_start__"));
        assert!(callees.contains(&"__check_root__"));
        assert!(callees.contains(&"start_range"));
        assert!(record.top_level_code);
    }

    #[test]
    fn test_model_over_small_corpus() {
        let ctx = IndexContext::default();
        let lib = index_source(
            Path::new("/c/Utilities/Queries.sh"),
            "Utilities/Queries.sh",
            "__vm_start__() { qm start \"$1\"; }\n",
            &ctx,
        )
        .unwrap();
        let entry = index_source(
            Path::new("/c/Start.sh"),
            "Start.sh",
            "source \"${UTILITYPATH}/Queries.sh\"\n__vm_start__ 100\n",
            &ctx,
        )
        .unwrap();
        let model = Model::build(vec![entry, lib], Path::new("/c"), &TetherConfig::default());

        assert_eq!(model.role("Start.sh"), Role::Entry);
        assert_eq!(model.role("Utilities/Queries.sh"), Role::Library);
        assert_eq!(model.modules.includes("Start.sh"), vec!["Utilities/Queries.sh"]);
        assert!(model.findings.iter().all(|f| f.severity != Severity::Fatal));
    }
}
