//! The failure shapes callers branch on
//!
//! Every failed call surfaces as a [`NormalizedError`]; a call cancelled by
//! its issuer surfaces as [`CallError::Cancelled`] instead. Nothing else
//! crosses the client boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Status used when no server response arrived
pub const STATUS_NETWORK: i32 = 0;
/// Status used when the request could not be constructed or sent
pub const STATUS_UNSENDABLE: i32 = -1;

/// Kind of failure, derived from the status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// The server responded with an error status
    ServerRejected,
    /// The request reached no server
    Unreachable,
    /// The request never left the device
    Unsendable,
}

/// Normalized failure representation
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[error("[{status}] {message}")]
pub struct NormalizedError {
    /// `>= 100`: HTTP status; `0`: no response; `-1`: not sent
    pub status: i32,
    /// Human-readable summary
    pub message: String,
    /// Field-level errors, present only when the server returned them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_errors: Option<Value>,
    /// True only when `status == 0`
    pub is_network_error: bool,
}

impl NormalizedError {
    /// Failure kind for this error
    pub fn kind(&self) -> FailureKind {
        match self.status {
            STATUS_NETWORK => FailureKind::Unreachable,
            s if s < 0 => FailureKind::Unsendable,
            _ => FailureKind::ServerRejected,
        }
    }

    /// Whether the server reported the session as expired or missing
    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }
}

/// Outcome of a call that did not succeed
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CallError {
    /// The call settled with a normalized failure
    #[error(transparent)]
    Failed(#[from] NormalizedError),

    /// The call was cancelled by its issuer before settling
    #[error("request cancelled")]
    Cancelled,
}

impl CallError {
    /// The normalized failure, unless the call was cancelled
    pub fn normalized(&self) -> Option<&NormalizedError> {
        match self {
            Self::Failed(error) => Some(error),
            Self::Cancelled => None,
        }
    }

    /// Whether the call was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether the failure was a pure network failure
    pub fn is_network_error(&self) -> bool {
        self.normalized().is_some_and(|e| e.is_network_error)
    }

    /// Status of the normalized failure
    pub fn status(&self) -> Option<i32> {
        self.normalized().map(|e| e.status)
    }
}
