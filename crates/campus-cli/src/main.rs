//! Campus CLI - command-line client for the Campus Admin backend
//!
//! Signs in, inspects the stored session, and issues API calls through the
//! same client core the mobile app uses.

mod cli;
mod config;
mod error;
mod handlers;
mod logging;
mod output;

use campus_core::{ApiClient, FileCredentialStore};
use cli::{Cli, Commands};
use colored::control;
use error::Result;
use logging::LoggingConfig;
use output::OutputWriter;
use std::process;
use std::sync::Arc;
use tracing::instrument;

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    control::set_override(cli.use_color());

    if let Err(e) = init_logging(&cli) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match run(cli).await {
        Ok(()) => process::exit(0),
        Err(e) => {
            eprintln!("{}", error::format_error(&e, control::SHOULD_COLORIZE.should_colorize()));

            if e.should_show_help() {
                eprintln!("\nFor more information, try '--help'");
            }

            process::exit(e.exit_code());
        }
    }
}

/// Main application logic
#[instrument(skip(cli), fields(command = cli.command.name()))]
async fn run(cli: Cli) -> Result<()> {
    let client_config = config::resolve_client_config(&cli)?;
    let store_dir = config::resolve_store_dir(&cli)?;
    let store = Arc::new(FileCredentialStore::new(&store_dir));
    tracing::debug!(store = %store.path().display(), "using credential store");

    let client = ApiClient::new(client_config, store)?;
    let mut output = OutputWriter::new(cli.use_color(), cli.quiet);

    match cli.command {
        Commands::Login(args) => handlers::handle_login(args, &client, &mut output).await,
        Commands::Logout => handlers::handle_logout(&client, &mut output).await,
        Commands::Whoami(args) => handlers::handle_whoami(args, &client, &mut output).await,
        Commands::Request(args) => handlers::handle_request(args, &client, &mut output).await,
    }
}

/// Initialize the logging system
fn init_logging(cli: &Cli) -> Result<()> {
    let mut logging_config = LoggingConfig::from_verbosity(cli.verbosity_level());
    logging_config.merge_with_env();
    logging_config.ansi = cli.use_color();

    if cli.quiet {
        logging_config.level = "error".to_string();
    }

    logging::init_logging(logging_config)
}
