//! # tcs CLI entry point
//!
//! Parses command-line arguments, resolves configuration, and dispatches to
//! subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tcs_cli::config::CliConfig;
use tcs_cli::fetch::{run_fetch, FetchArgs};
use tcs_cli::migrate::{run_migrate, MigrateArgs};
use tcs_cli::totals::{run_totals, TotalsArgs};
use tcs_cli::validate::{run_validate, ValidateArgs};
use tcs_cli::EXIT_OPERATIONAL;

/// Technology Carbon Standard toolkit
///
/// Validates, totals, migrates and fetches Technology Carbon Standard
/// emissions documents.
#[derive(Parser, Debug)]
#[command(name = "tcs", version, about, long_about = None)]
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
    /// Validate a document against its schemas and the semantic rules.
    Validate(ValidateArgs),

    /// Print per-category and overall emissions.
    Totals(TotalsArgs),

    /// Migrate a document forward to newer schema versions.
    Migrate(MigrateArgs),

    /// Download a published document.
    Fetch(FetchArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over -v when set.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "tcs CLI starting");

    let config = match CliConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{e}");
            return ExitCode::from(EXIT_OPERATIONAL);
        }
    };
    tracing::debug!(?config, "resolved configuration");

    let result = match cli.command {
        Commands::Validate(args) => run_validate(&args, &config),
        Commands::Totals(args) => run_totals(&args),
        Commands::Migrate(args) => run_migrate(&args, &config),
        Commands::Fetch(args) => run_fetch(&args, &config),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(EXIT_OPERATIONAL)
        }
    }
}
