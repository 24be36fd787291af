//! Campus Core - shared HTTP client for the Campus Admin backend
//!
//! Every domain service of the school administration app (students, fees,
//! attendance, assessments, auth, ...) talks to the REST backend through the
//! [`ApiClient`] defined here.
//!
//! # Main Components
//!
//! - **Configuration**: [`ClientConfig`] resolved once per process
//! - **Credential storage**: [`CredentialStore`] and the [`Session`] helpers
//! - **Transport core**: [`ApiClient`] with its request/response pipelines,
//!   retry policy and error normalizer
//! - **Domain services**: thin callers in [`services`]
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use campus_core::{ApiClient, ClientConfig, Environment, MemoryCredentialStore};
//!
//! async fn example() -> campus_core::Result<()> {
//!     let config = ClientConfig::for_environment(Environment::Staging);
//!     let client = ApiClient::new(config, Arc::new(MemoryCredentialStore::new()))?;
//!
//!     match client.get("students").await {
//!         Ok(students) => println!("{students}"),
//!         Err(e) if e.is_network_error() => eprintln!("offline"),
//!         Err(e) => eprintln!("{e}"),
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod services;
pub mod store;

pub use config::{ClientConfig, Environment};
pub use error::{Error, Result, StoreError};
pub use http::{
    ApiClient, CallError, CancelHandle, MutationRetry, NormalizedError, RetryPolicy,
    TimeoutConfig,
};
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore, Session};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
