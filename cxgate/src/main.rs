//! cxgate CLI entry point.
//!
//! Dispatches to `run` (the adapter itself, the default), `config` (load,
//! validate, and pretty-print the config file), or `version`.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use cxgate::config::{Config, CONFIG_FILE};
use cxgate::grpc::ServiceConn;
use cxgate::metrics::Metrics;
use cxgate::server::{serve, AppState};
use cxgate::{logging, VERSION};

/// cxgate: HTTP/JSON to gRPC streaming adapter for CX network services.
#[derive(Parser)]
#[command(name = "cxgate", version)]
struct Cli {
    /// Path to the config file.
    #[arg(long, default_value = CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the adapter (the default when no subcommand is given).
    Run,
    /// Load, validate, and pretty-print the config file.
    Config,
    /// Print version and commit information.
    Version,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let code = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(&cli.config).await,
        Commands::Config => print_config(&cli.config),
        Commands::Version => {
            println!(
                "cxgate {VERSION} (commit {})",
                option_env!("CXGATE_COMMIT").unwrap_or("unknown")
            );
            0
        }
    };

    std::process::exit(code);
}

/// Load the config, connect to the service, and serve until shutdown.
async fn run(config_path: &PathBuf) -> i32 {
    let mut config = match Config::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("cxgate: loading configuration failed: {e}");
            return 1;
        }
    };
    if let Err(e) = config.validate() {
        eprintln!("cxgate: config validation error: {e}");
        return 1;
    }
    if let Err(e) = logging::init(&config.general.logger) {
        eprintln!("cxgate: logger creation failed: {e}");
        return 1;
    }

    let client = match ServiceConn::connect(&config.service.location) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::error!(error = %e, "connecting to service failed");
            eprintln!("cxgate: connecting to service failed: {e}");
            return 1;
        }
    };

    let state = AppState::new(config, client, Arc::new(Metrics::new()));
    if let Err(e) = serve(state).await {
        tracing::error!(error = %e, "server terminated");
        eprintln!("cxgate: server terminated: {e}");
        return 1;
    }
    0
}

/// The `config` subcommand: surface exactly what the adapter would run
/// with, defaults applied.
fn print_config(config_path: &PathBuf) -> i32 {
    let mut config = match Config::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("cxgate: loading configuration failed: {e}");
            return 1;
        }
    };
    if let Err(e) = config.validate() {
        eprintln!("cxgate: config validation error: {e}");
        return 1;
    }
    match config.to_pretty_json() {
        Ok(rendered) => {
            println!("{rendered}");
            0
        }
        Err(e) => {
            eprintln!("cxgate: error reporting configuration: {e}");
            1
        }
    }
}
