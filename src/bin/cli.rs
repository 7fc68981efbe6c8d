//! Tether CLI - shell script corpus checker.
//!
//! Usage:
//!   tether check                 # Report findings
//!   tether check --fix           # Report and apply automatic fixes
//!   tether check --strict --json # Advisories fail the run, JSON output
//!   tether cycles                # Include cycles only
//!   tether graph                 # Canonical model snapshot (JSON)
//!   tether stats                 # Scan and model statistics
//!
//! Exit codes: 0 clean, 1 unfixed fatal findings, 2 engine error.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, Write};
use std::process;
use tracing::info;

use tether::cli::{execute, Cli};

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    match run(&cli) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(2);
        }
    }
}

fn run(cli: &Cli) -> Result<i32> {
    info!(root = %cli.root.display(), "tether starting");
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let code = execute(cli, &mut out)
        .with_context(|| format!("tether failed on {}", cli.root.display()))?;
    out.flush().context("flushing stdout")?;
    Ok(code)
}
