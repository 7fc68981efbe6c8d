//! CLI module for Tether.
//!
//! Commands:
//! - check: report findings, optionally apply fixes
//! - fix: shorthand for `check --fix`
//! - graph, cycles, stats: inspect the model

use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;

use crate::analysis::cycles::detect_cycles;
use crate::analysis::{Analysis, AnalysisSet};
use crate::check::{build_model, run, CheckOptions, ConfigSource, Mode};
use crate::error::{Result, TetherError};
use crate::report::{render_cycles, render_json, render_text, TextOptions};

#[derive(Debug, Parser)]
#[command(name = "tether")]
#[command(about = "Dependency graph, dead-code and idempotent auto-fix engine for shell scripts")]
#[command(version)]
pub struct Cli {
    /// Corpus root directory (default: current directory)
    #[arg(short, long, default_value = ".")]
    pub root: PathBuf,

    /// Config file (default: <root>/.tether.toml when present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    // ─── Analysis ───────────────────────────────────────────────────
    /// Run the analyses and report findings
    Check {
        /// Apply every automatic fix
        #[arg(long)]
        fix: bool,

        #[command(flatten)]
        args: CheckArgs,
    },

    /// Same as `check --fix`
    Fix {
        #[command(flatten)]
        args: CheckArgs,
    },

    // ─── Model ──────────────────────────────────────────────────────
    /// Print the canonical model snapshot as JSON
    Graph,

    /// List include cycles
    Cycles,

    /// Show scan and model statistics
    Stats,
}

#[derive(Debug, Clone, Default, Args)]
pub struct CheckArgs {
    /// Advisory findings fail the run
    #[arg(long)]
    pub strict: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Run only these analyses (repeatable)
    #[arg(long, value_name = "ANALYSIS")]
    pub only: Vec<Analysis>,

    /// Skip these analyses (repeatable)
    #[arg(long, value_name = "ANALYSIS")]
    pub skip: Vec<Analysis>,

    /// Also run these opt-in analyses (repeatable)
    #[arg(long = "with", value_name = "ANALYSIS")]
    pub with: Vec<Analysis>,

    /// Show the diff of every planned or applied fix
    #[arg(long)]
    pub diff: bool,

    /// Include info-level findings in the text report
    #[arg(long)]
    pub info: bool,
}

impl CheckArgs {
    pub fn analyses(&self) -> AnalysisSet {
        let base = if self.only.is_empty() {
            AnalysisSet::default()
        } else {
            AnalysisSet::only(self.only.iter().copied())
        };
        let base = self.with.iter().fold(base, |set, a| set.with(*a));
        self.skip.iter().fold(base, |set, a| set.without(*a))
    }
}

impl Cli {
    fn options(&self) -> CheckOptions {
        let config = match &self.config {
            Some(path) => ConfigSource::File(path.clone()),
            None => ConfigSource::Discover,
        };
        CheckOptions::new(&self.root).with_config(config)
    }
}

/// Run the parsed command, writing the report to `out`. Returns the exit
/// code; engine failures come back as `Err`.
pub fn execute(cli: &Cli, out: &mut dyn Write) -> Result<i32> {
    match &cli.command {
        Commands::Check { fix, args } => check(cli, *fix, args, out),
        Commands::Fix { args } => check(cli, true, args, out),
        Commands::Graph => {
            let (model, _) = build_model(&cli.options())?;
            emit(out, &model.snapshot_json()?)?;
            emit(out, "\n")?;
            Ok(0)
        }
        Commands::Cycles => {
            let (model, _) = build_model(&cli.options())?;
            let cycles = detect_cycles(&model.modules);
            emit(out, &render_cycles(&cycles))?;
            Ok(if cycles.is_empty() { 0 } else { 1 })
        }
        Commands::Stats => {
            let (model, scan) = build_model(&cli.options())?;
            emit(out, &format!("{}\n{}\n", scan.stats, model.stats()))?;
            Ok(0)
        }
    }
}

fn check(cli: &Cli, fix: bool, args: &CheckArgs, out: &mut dyn Write) -> Result<i32> {
    let mode = if fix { Mode::Fix } else { Mode::ReportOnly };
    let options = cli
        .options()
        .with_mode(mode)
        .with_strict(args.strict)
        .with_analyses(args.analyses());
    let report = run(&options)?;
    let text = if args.json {
        let mut json = render_json(&report)?;
        json.push('\n');
        json
    } else {
        render_text(
            &report,
            TextOptions {
                show_info: args.info || cli.verbose,
                show_diffs: args.diff,
            },
        )
    };
    emit(out, &text)?;
    Ok(report.exit_code())
}

fn emit(out: &mut dyn Write, text: &str) -> Result<()> {
    out.write_all(text.as_bytes())
        .map_err(|e| TetherError::io("<stdout>", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_parse_check_flags() {
        let cli = Cli::try_parse_from([
            "tether", "-r", "/srv/scripts", "check", "--strict", "--only", "cycles", "--only",
            "dead-code", "--skip", "dead-code",
        ])
        .unwrap();
        assert_eq!(cli.root, PathBuf::from("/srv/scripts"));
        let Commands::Check { fix, args } = &cli.command else {
            panic!("expected check");
        };
        assert!(!fix);
        assert!(args.strict);
        let analyses: Vec<Analysis> = args.analyses().iter().collect();
        assert_eq!(analyses, vec![Analysis::Cycles]);
    }

    #[test]
    fn test_with_adds_opt_in_analyses() {
        let cli = Cli::try_parse_from([
            "tether", "check", "--with", "script-notes", "--with", "security", "--skip", "docs",
        ])
        .unwrap();
        let Commands::Check { args, .. } = &cli.command else {
            panic!("expected check");
        };
        let analyses = args.analyses();
        assert!(analyses.contains(Analysis::ScriptNotes));
        assert!(analyses.contains(Analysis::Security));
        assert!(analyses.contains(Analysis::Cycles));
        assert!(!analyses.contains(Analysis::Docs));
        assert!(!analyses.contains(Analysis::LoggingCoverage));
    }

    #[test]
    fn test_unknown_analysis_is_rejected() {
        assert!(Cli::try_parse_from(["tether", "check", "--only", "spelling"]).is_err());
    }

    #[test]
    fn test_cycles_command_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.sh"), "source ./b.sh\n").unwrap();
        fs::write(dir.path().join("b.sh"), "source ./a.sh\n").unwrap();
        let root = dir.path().to_string_lossy().to_string();
        let cli = Cli::try_parse_from(["tether", "-r", root.as_str(), "cycles"]).unwrap();

        let mut out = Vec::new();
        assert_eq!(execute(&cli, &mut out).unwrap(), 1);
        assert_eq!(String::from_utf8(out).unwrap(), "1. a.sh -> b.sh -> a.sh\n1 cycle(s)\n");
    }

    #[test]
    fn test_check_json_output() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("run.sh"), "#!/bin/bash\necho hi\n").unwrap();
        let root = dir.path().to_string_lossy().to_string();
        let cli = Cli::try_parse_from(["tether", "-r", root.as_str(), "check", "--json"]).unwrap();

        let mut out = Vec::new();
        assert_eq!(execute(&cli, &mut out).unwrap(), 0);
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["passed"], true);
    }
}
