//! # pharmstock CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.
//! Handlers return an exit code: 0 for success, 1 for errors, and 2 when
//! the dispensing gate refuses a request.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pharmstock_cli::catalog::{run_catalog, CatalogArgs};
use pharmstock_cli::convert::{run_convert, ConvertArgs};
use pharmstock_cli::dispense::{run_dispense_check, DispenseCheckArgs};
use pharmstock_cli::expiry::{run_expiry, ExpiryArgs};
use pharmstock_cli::fefo::{run_fefo, FefoArgs};
use pharmstock_core::PharmaConfig;

/// pharmstock: batch and packaging-unit tooling for pharmacy inventory.
///
/// Validates product catalogs, converts quantities between packaging
/// levels, reports batch expiry, proposes FEFO allocations, and checks
/// whether a dispense would be allowed.
#[derive(Parser, Debug)]
#[command(name = "pharmstock", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to a YAML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Product catalog checks.
    Catalog(CatalogArgs),

    /// Convert a quantity between packaging levels.
    Convert(ConvertArgs),

    /// Classify batches into expiry buckets.
    Expiry(ExpiryArgs),

    /// Propose a first-expiry-first-out allocation.
    Fefo(FefoArgs),

    /// Check whether a dispense from one batch would be allowed.
    #[command(name = "dispense-check")]
    DispenseCheck(DispenseCheckArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    tracing::debug!("pharmstock CLI starting");

    let config = match PharmaConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{e}");
            return ExitCode::from(1);
        }
    };

    let result = match cli.command {
        Commands::Catalog(args) => run_catalog(&args, &config),
        Commands::Convert(args) => run_convert(&args, &config),
        Commands::Expiry(args) => run_expiry(&args, &config),
        Commands::Fefo(args) => run_fefo(&args, &config),
        Commands::DispenseCheck(args) => run_dispense_check(&args, &config),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
