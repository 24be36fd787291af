//! Domain services built on [`ApiClient`](crate::http::ApiClient)
//!
//! Each service is a thin caller: it picks the verb and path, passes the
//! payload through, and leaves retries, credentials and error shapes to the
//! client core.

pub mod auth;
pub mod students;

pub use auth::{AuthService, LoginResponse};
pub use students::StudentService;

use thiserror::Error;

use crate::error::StoreError;
use crate::http::CallError;

/// Errors returned by domain services
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The call itself failed or was cancelled
    #[error(transparent)]
    Call(#[from] CallError),

    /// The server answered 2xx with a body of the wrong shape
    #[error("unexpected response body: {0}")]
    UnexpectedBody(#[from] serde_json::Error),

    /// Session state could not be read or written
    #[error("session storage failed: {0}")]
    Store(#[from] StoreError),
}

impl ServiceError {
    /// Status of the normalized call failure, if that is what this is
    pub fn status(&self) -> Option<i32> {
        match self {
            Self::Call(e) => e.status(),
            _ => None,
        }
    }
}
