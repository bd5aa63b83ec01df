//! Finna database maintenance CLI
//!
//! - `finna db-upgrade`: bring the live schema in line with the declared one
//! - `finna db-status`: report what an upgrade would change

use anyhow::Result;
use clap::{Parser, Subcommand};
use finna_logging::{init_logging, LogConfig};
use std::process::ExitCode;
use tracing::error;

mod cli;

#[derive(Parser, Debug)]
#[command(name = "finna", about = "Finna database maintenance", version)]
struct Cli {
    /// Enable verbose logging (info/debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create missing tables, columns, constraints and keys; fix charsets
    DbUpgrade(cli::db_upgrade::DbUpgradeArgs),

    /// Show how the live database differs from the declared schema
    DbStatus(cli::db_status::DbStatusArgs),
}

fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::DbUpgrade(_) => "db-upgrade",
        Commands::DbStatus(_) => "db-status",
    }
}

fn run_command(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::DbUpgrade(args) => cli::db_upgrade::run(args),
        Commands::DbStatus(args) => cli::db_status::run(args),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = init_logging(LogConfig {
        app_name: "finna",
        verbose: cli.verbose,
        log_dir: None,
    }) {
        eprintln!("Warning: failed to initialise logging: {:#}", err);
    }

    let name = command_name(&cli.command);
    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(command = name, "Command failed: {:#}", err);
            match err.downcast_ref::<cli::error::HelpfulError>() {
                Some(helpful) => eprint!("{}", helpful),
                None => eprintln!("ERROR: {:#}", err),
            }
            ExitCode::FAILURE
        }
    }
}
