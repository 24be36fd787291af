//! Error normalization
//!
//! Collapses the three failure shapes a call can end in (server rejection,
//! no response, never sent) into one [`NormalizedError`]. The mapping is
//! pure: the same [`CallFailure`] always yields an equal result, and nothing
//! is logged here.

use serde_json::Value;

use crate::http::context::CallFailure;
use crate::http::error::{NormalizedError, STATUS_NETWORK, STATUS_UNSENDABLE};

/// Message used when no response arrived
pub const NETWORK_MESSAGE: &str =
    "Unable to reach the server. Please check your internet connection and try again.";

/// Message used when the request could not be sent and no detail is known
pub const UNSENDABLE_MESSAGE: &str = "The request could not be sent.";

/// Normalize a failed attempt
pub fn normalize(failure: &CallFailure) -> NormalizedError {
    match failure {
        CallFailure::Status { status, body } => NormalizedError {
            status: i32::from(*status),
            message: extract_message(body).unwrap_or_else(|| fallback_message(*status)),
            validation_errors: extract_validation_errors(body),
            is_network_error: false,
        },
        CallFailure::NoResponse { .. } => NormalizedError {
            status: STATUS_NETWORK,
            message: NETWORK_MESSAGE.to_string(),
            validation_errors: None,
            is_network_error: true,
        },
        CallFailure::Unsendable { reason } => NormalizedError {
            status: STATUS_UNSENDABLE,
            message: reason
                .clone()
                .unwrap_or_else(|| UNSENDABLE_MESSAGE.to_string()),
            validation_errors: None,
            is_network_error: false,
        },
    }
}

/// Generic message for a status class when the server supplied none
pub fn fallback_message(status: u16) -> String {
    match status {
        400 => "The request was invalid.".to_string(),
        401 => "Your session has expired. Please sign in again.".to_string(),
        403 => "You do not have permission to perform this action.".to_string(),
        404 => "The requested resource was not found.".to_string(),
        422 => "Some of the submitted fields are invalid.".to_string(),
        429 => "Too many requests. Please wait a moment and try again.".to_string(),
        500..=599 => "The server encountered an error. Please try again later.".to_string(),
        _ => format!("Request failed with status {status}."),
    }
}

/// Server-supplied `message`, when it is a non-empty string
fn extract_message(body: &Value) -> Option<String> {
    body.get("message")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

/// Server-supplied `errors`, when it is an object or an array
fn extract_validation_errors(body: &Value) -> Option<Value> {
    body.get("errors")
        .filter(|errors| errors.is_object() || errors.is_array())
        .cloned()
}
