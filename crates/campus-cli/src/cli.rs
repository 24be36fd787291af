//! Command-line interface argument parsing and definitions
//!
//! This module defines the CLI structure using clap's derive API.

use campus_core::http::Method;
use campus_core::Environment;
use clap::{Args, Parser, Subcommand};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::str::FromStr;

/// Campus CLI - talk to the Campus Admin backend from a terminal
///
/// Uses the same client core as the mobile app: bearer credentials from the
/// local session, bounded retries, and one error shape for every failure.
#[derive(Parser, Debug)]
#[command(
    name = "campus",
    version,
    author,
    about,
    long_about = None,
    propagate_version = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Enable verbose output (can be used multiple times for increased verbosity)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Backend environment
    #[arg(
        short,
        long = "env",
        global = true,
        env = "CAMPUS_ENV",
        default_value = "production",
        value_parser = parse_environment
    )]
    pub environment: Environment,

    /// Override the environment's origin, e.g. http://10.0.2.2:8000
    #[arg(long, global = true, env = "CAMPUS_BASE_URL")]
    pub base_url: Option<String>,

    /// Directory holding the stored session
    #[arg(long, global = true, env = "CAMPUS_STORE_DIR")]
    pub store_dir: Option<PathBuf>,

    /// Log every request and response (ignored for production)
    #[arg(long, global = true)]
    pub dev_mode: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// The subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in and store the issued session
    Login(LoginArgs),

    /// End the session and forget stored credentials
    Logout,

    /// Show the signed-in user
    Whoami(WhoamiArgs),

    /// Issue a raw API call through the client core
    Request(RequestArgs),
}

/// Arguments for the login command
#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Account email
    #[arg(long, env = "CAMPUS_EMAIL")]
    pub email: String,

    /// Account password
    #[arg(long, env = "CAMPUS_PASSWORD", hide_env_values = true)]
    pub password: String,
}

/// Arguments for the whoami command
#[derive(Args, Debug)]
pub struct WhoamiArgs {
    /// Fetch the user from the server instead of the local cache
    #[arg(long)]
    pub refresh: bool,
}

/// Arguments for the request command
#[derive(Args, Debug)]
pub struct RequestArgs {
    /// HTTP method
    #[arg(value_name = "METHOD", value_parser = parse_method)]
    pub method: Method,

    /// Path relative to the API prefix, e.g. students/42
    #[arg(value_name = "PATH")]
    pub path: String,

    /// JSON request body
    #[arg(short, long, value_name = "JSON")]
    pub data: Option<String>,

    /// Query parameter (repeatable)
    #[arg(long = "query", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub query: Vec<(String, String)>,
}

impl Commands {
    /// Subcommand name, safe to log
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Login(_) => "login",
            Commands::Logout => "logout",
            Commands::Whoami(_) => "whoami",
            Commands::Request(_) => "request",
        }
    }
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the effective verbosity level (considering quiet flag)
    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }

    /// Check if colored output should be used
    pub fn use_color(&self) -> bool {
        !self.no_color && std::io::stderr().is_terminal()
    }
}

fn parse_environment(value: &str) -> Result<Environment, String> {
    Environment::from_str(value).map_err(|e| e.to_string())
}

fn parse_method(value: &str) -> Result<Method, String> {
    Method::from_bytes(value.to_ascii_uppercase().as_bytes())
        .map_err(|_| format!("invalid HTTP method '{value}'"))
}

fn parse_key_value(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((key, val)) if !key.is_empty() => Ok((key.to_string(), val.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{value}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_request_arguments() {
        let cli = Cli::parse_from([
            "campus",
            "--env",
            "staging",
            "request",
            "get",
            "students",
            "--query",
            "class=7B",
            "--query",
            "page=2",
        ]);
        assert_eq!(cli.environment, Environment::Staging);

        let Commands::Request(args) = cli.command else {
            panic!("expected request command");
        };
        assert_eq!(args.method, Method::GET);
        assert_eq!(args.path, "students");
        assert_eq!(
            args.query,
            vec![
                ("class".to_string(), "7B".to_string()),
                ("page".to_string(), "2".to_string())
            ]
        );
    }

    #[test]
    fn test_verbosity_level() {
        let cli = Cli::parse_from(["campus", "-vv", "logout"]);
        assert_eq!(cli.verbosity_level(), 2);

        let cli = Cli::parse_from(["campus", "--quiet", "logout"]);
        assert_eq!(cli.verbosity_level(), 0);
    }

    #[test]
    fn test_value_parsers() {
        assert!(parse_environment("prod").is_ok());
        assert!(parse_environment("qa").is_err());
        assert_eq!(parse_method("patch").unwrap(), Method::PATCH);
        assert!(parse_method("GE T").is_err());
        assert_eq!(
            parse_key_value("q=a=b").unwrap(),
            ("q".to_string(), "a=b".to_string())
        );
        assert!(parse_key_value("=x").is_err());
        assert!(parse_key_value("novalue").is_err());
    }
}
