//! terrain-pyramid - build quadtree elevation and color tile pyramids.

mod commands;
mod error;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use terrain_pyramid::logging::{init_logging, WorkerGuard};
use terrain_pyramid::ConfigFile;

use commands::build::BuildArgs;
use commands::common::load_config;
use commands::config::ConfigCommands;
use commands::plan::PlanArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "terrain-pyramid")]
#[command(version, about = "Build quadtree tile pyramids from elevation and color rasters")]
struct Cli {
    /// Configuration file (default: ~/.terrain-pyramid/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the tile pyramid and manifest
    Build(BuildArgs),

    /// Show the pyramid layout without decoding or writing anything
    Plan(PlanArgs),

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::from(err.exit_code())
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let explicit = cli.config.as_deref();

    match cli.command {
        Commands::Config { command } => commands::config::run(command, explicit),
        Commands::Build(args) => {
            let file = start(explicit, cli.verbose)?;
            commands::build::run(&args, file.config.pyramid)
        }
        Commands::Plan(args) => {
            let file = start(explicit, cli.verbose)?;
            commands::plan::run(&args, file.config.pyramid)
        }
    }
}

/// Loaded configuration plus the log writer guard, which must outlive the command.
struct Session {
    config: ConfigFile,
    _guard: Option<WorkerGuard>,
}

fn start(explicit: Option<&Path>, verbose: bool) -> Result<Session, CliError> {
    let config = load_config(explicit)?;
    let mut logging = config.logging.clone();
    if verbose {
        logging.level = "debug".to_string();
    }
    let guard = init_logging(&logging)?;
    tracing::debug!(config = ?explicit, "configuration loaded");
    Ok(Session {
        config,
        _guard: guard,
    })
}
