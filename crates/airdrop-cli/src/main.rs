//! # airdrop CLI entry point
//!
//! Parses arguments, sets up logging, and dispatches to the subcommand
//! handlers in the library crate.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use airdrop_cli::diff::{run_diff, DiffArgs};
use airdrop_cli::ledger::{run_ledger, LedgerArgs};
use airdrop_cli::run::{run_distribution, RunArgs};
use airdrop_cli::settings::ConfigArgs;
use airdrop_cli::EXIT_FAILURE;

/// Guild token airdrop.
///
/// Pays every member of a guild role who is not yet in the distribution
/// ledger, in batches, recording each batch only after it confirms.
#[derive(Parser, Debug)]
#[command(name = "airdrop", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(flatten)]
    settings: ConfigArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Distribute to new role members, or preview with --dry-run.
    Run(RunArgs),

    /// Print the addresses that a run would pay.
    Diff(DiffArgs),

    /// Inspect, verify, export, or resolve the distribution ledger.
    Ledger(LedgerArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    // Logs go to stderr so stdout stays parseable.
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "airdrop starting");

    let result = match cli.command {
        Commands::Run(args) => run_distribution(&args, &cli.settings).await,
        Commands::Diff(args) => run_diff(&args, &cli.settings).await,
        Commands::Ledger(args) => run_ledger(&args, &cli.settings),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}
