//! Resolution of client configuration from command-line flags
//!
//! Everything the client core needs is decided here, once, before any call
//! is made. The library itself never reads the environment.

use crate::cli::Cli;
use crate::error::{Error, Result};
use campus_core::ClientConfig;
use std::path::PathBuf;

/// Name of the per-user data directory
const APP_DIR: &str = "campus";

/// Build the client configuration for this invocation
pub fn resolve_client_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = ClientConfig::for_environment(cli.environment);

    if let Some(base_url) = &cli.base_url {
        config = config.with_origin(base_url)?;
    }
    if cli.dev_mode {
        config = config.with_developer_mode(true);
    }

    config.validate()?;
    tracing::debug!(
        environment = %config.environment,
        origin = %config.origin,
        developer_mode = config.developer_mode(),
        "resolved client configuration"
    );

    Ok(config)
}

/// Directory the session is stored in
pub fn resolve_store_dir(cli: &Cli) -> Result<PathBuf> {
    if let Some(dir) = &cli.store_dir {
        return Ok(dir.clone());
    }

    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR))
        .ok_or_else(|| Error::config("no data directory available; pass --store-dir"))
}
