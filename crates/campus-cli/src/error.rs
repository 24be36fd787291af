//! Error types and handling for the CLI

use campus_core::services::ServiceError;
use campus_core::{CallError, StoreError};

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, Error>;

/// Exit code for usage and configuration problems
pub const EXIT_USAGE: i32 = 2;
/// Exit code when the backend could not be reached
pub const EXIT_NETWORK: i32 = 3;
/// Exit code when the backend rejected the credentials
pub const EXIT_UNAUTHORIZED: i32 = 4;

/// Main error type for CLI operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Error from campus-core while setting up
    #[error("{0}")]
    Core(#[from] campus_core::Error),

    /// A backend call failed or was cancelled
    #[error("{0}")]
    Call(#[from] CallError),

    /// Reading or writing the stored session failed
    #[error("Session storage error: {0}")]
    Store(#[from] StoreError),

    /// IO error (writing output, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid argument combination or value
    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    /// The command needs a session and none is stored
    #[error("Not signed in. Run 'campus login' first")]
    NotSignedIn,
}

impl From<ServiceError> for Error {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::Call(e) => Self::Call(e),
            ServiceError::UnexpectedBody(e) => Self::Json(e),
            ServiceError::Store(e) => Self::Store(e),
        }
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an invalid arguments error
    pub fn invalid_args(message: impl Into<String>) -> Self {
        Self::InvalidArgs(message.into())
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::InvalidArgs(_) => EXIT_USAGE,
            Self::Core(campus_core::Error::Configuration { .. }) => EXIT_USAGE,
            Self::Call(e) if e.is_network_error() => EXIT_NETWORK,
            Self::Call(e) if e.status() == Some(401) => EXIT_UNAUTHORIZED,
            Self::NotSignedIn => EXIT_UNAUTHORIZED,
            _ => 1,
        }
    }

    /// Check if this error should display usage help
    pub fn should_show_help(&self) -> bool {
        matches!(self, Self::InvalidArgs(_))
    }
}

/// Format an error for display to the user
pub fn format_error(error: &Error, use_color: bool) -> String {
    let mut text = error.to_string();

    if let Error::Call(CallError::Failed(normalized)) = error {
        if let Some(fields) = &normalized.validation_errors {
            let rendered =
                serde_json::to_string_pretty(fields).unwrap_or_else(|_| fields.to_string());
            text.push('\n');
            text.push_str(&rendered);
        }
    }

    if use_color {
        use colored::Colorize;
        format!("{} {}", "Error:".red().bold(), text)
    } else {
        format!("Error: {}", text)
    }
}
