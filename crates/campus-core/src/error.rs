//! Error types for the Campus client core
//!
//! [`Error`] covers faults raised while *constructing* the client: bad
//! configuration, a transport that cannot be built, a credential store that
//! cannot be opened. Failures of individual calls never use this type; they
//! surface as [`crate::http::CallError`].

use thiserror::Error;

/// Main error type for client construction and configuration
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The underlying HTTP client could not be created
    #[error("HTTP client error: {message}")]
    HttpClient {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// Credential store errors
    #[error("Credential store error: {0}")]
    Store(#[from] StoreError),

    /// JSON parsing and serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Failures raised by a [`crate::store::CredentialStore`] implementation
#[derive(Error, Debug)]
pub enum StoreError {
    /// Reading or writing the backing storage failed
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The stored data could not be encoded or decoded
    #[error("stored data is malformed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The store is not reachable at all (locked keychain, missing mount, ...)
    #[error("credential store unavailable: {0}")]
    Unavailable(String),
}
