//! Eldritch Sanctuary CLI
//!
//! Headless driver for the layer and GPS core: configuration management,
//! scripted GPS scenarios and object churn checks.

mod commands;
mod error;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use console::style;
use sanctuary::config::ConfigFile;
use sanctuary::logging::init_logging;

use commands::config::ConfigCommands;
use commands::simulate::SimulateArgs;
use commands::stress::StressArgs;

/// Eldritch Sanctuary - layer coordination and GPS reconciliation core
#[derive(Debug, Parser)]
#[command(name = "sanctuary")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log filter override (e.g. debug, sanctuary::gps=trace)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// View and modify configuration settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Run a scripted GPS scenario through every layer
    Simulate(SimulateArgs),

    /// Create and remove many map objects and check marker bookkeeping
    Stress(StressArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match ConfigFile::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "{} {}; using defaults",
                style("Warning:").yellow().bold(),
                e
            );
            ConfigFile::default()
        }
    };

    let mut logging = config.logging_config();
    if let Some(level) = cli.log_level {
        logging = logging.with_level(level);
    }
    // Keep the guard alive so the file writer flushes on exit.
    let _log_guard = match init_logging(&logging) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("{} logging disabled: {}", style("Warning:").yellow().bold(), e);
            None
        }
    };
    tracing::debug!(version = sanctuary::VERSION, "sanctuary CLI starting");

    let result = match cli.command {
        Commands::Config { command } => commands::config::run(command),
        Commands::Simulate(args) => commands::simulate::run(args, &config),
        Commands::Stress(args) => commands::stress::run(args, &config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
