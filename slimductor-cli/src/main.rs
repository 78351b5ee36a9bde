//! Slimductor: session registry and orchestrator election for concurrent
//! Claude Code sessions.
//!
//! # Usage
//!
//! ```text
//! slimductor register [--role orchestrator|worker|vacating] [--cwd <path>] [--session-id <id>] [--pid <pid>] [--json]
//! slimductor deregister [--session-id <id>] [--pid <pid>]
//! slimductor vacate [--session-id <id>] [--pid <pid>]
//! slimductor check [--json]
//! slimductor list
//! ```
//!
//! Meant to be called from host lifecycle hooks (`register` on session start,
//! `deregister` on stop) and by hand.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    check::CheckArgs, deregister::DeregisterArgs, list::ListArgs, register::RegisterArgs,
    vacate::VacateArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "slimductor",
    version,
    about = "Coordinate concurrent sessions through a shared on-disk registry",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register (or refresh) this session and print its elected role.
    Register(RegisterArgs),

    /// Remove this session's entry. Succeeds if it is already gone.
    Deregister(DeregisterArgs),

    /// Announce a handover: mark this session's orchestrator entry as vacating.
    Vacate(VacateArgs),

    /// Print a human-readable summary of live sessions.
    Check(CheckArgs),

    /// Print all live session entries as JSON.
    List(ListArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Register(args) => args.run(),
        Commands::Deregister(args) => args.run(),
        Commands::Vacate(args) => args.run(),
        Commands::Check(args) => args.run(),
        Commands::List(args) => args.run(),
    }
}

/// Diagnostics go to stderr; stdout carries command output only.
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
