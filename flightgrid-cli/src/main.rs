//! FlightGrid CLI - nearby live-flight queries from the command line.

mod commands;
mod error;

use clap::{Parser, Subcommand};
use flightgrid::config::ConfigFile;
use flightgrid::logging::{init_logging, LoggingGuard};

use commands::config::ConfigCommands;
use commands::normalize::NormalizeArgs;
use commands::query::QueryCommands;
use error::CliError;

#[derive(Debug, Parser)]
#[command(
    name = "flightgrid",
    version,
    about = "Nearby live-flight queries over a hexagonal grid"
)]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a nearby-flights query against the configured upstream
    Query {
        #[command(subcommand)]
        shape: QueryCommands,
    },

    /// Show the cache key and storage tiles for a radius query
    Normalize(NormalizeArgs),

    /// View and modify configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Config { command } => commands::config::run(command),
        Commands::Query { shape } => {
            let config = ConfigFile::load()?;
            let _guard = logging(&config, cli.verbose)?;
            commands::query::run(shape, &config).await
        }
        Commands::Normalize(args) => {
            let config = ConfigFile::load()?;
            let _guard = logging(&config, cli.verbose)?;
            commands::normalize::run(args, &config)
        }
    }
}

fn logging(config: &ConfigFile, verbose: bool) -> Result<LoggingGuard, CliError> {
    let mut logging = config.logging.clone();
    if verbose {
        logging.level = "debug".to_string();
    }
    Ok(init_logging(&logging)?)
}
