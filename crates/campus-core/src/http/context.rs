//! Per-call data carried through the pipeline
//!
//! A [`CallContext`] describes one logical call: verb, relative path, query,
//! JSON payload, headers and the trace id. Request steps decorate it; the
//! transport turns it into a physical attempt and reports back either a
//! [`RawResponse`] or a [`CallFailure`].

use std::collections::BTreeMap;
use std::fmt;

use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::Method;
use serde_json::Value;

/// Header carrying the bearer credential
pub const AUTHORIZATION: &str = "authorization";
/// Header carrying the per-call trace identifier
pub const REQUEST_ID: &str = "x-request-id";
/// Header carrying the fixed platform tag
pub const PLATFORM: &str = "x-platform";
/// Header carrying the client version tag
pub const CLIENT_VERSION: &str = "x-app-version";
/// Content type declaration
pub const CONTENT_TYPE: &str = "content-type";

const TRACE_ID_LEN: usize = 16;

/// Generate an opaque trace identifier.
///
/// Collision-tolerant, not a security credential.
pub fn generate_trace_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TRACE_ID_LEN)
        .map(char::from)
        .collect();
    format!("req_{suffix}")
}

/// The decorated description of a single outgoing call
#[derive(Debug, Clone)]
pub struct CallContext {
    /// HTTP verb
    pub method: Method,
    /// Path relative to the versioned API prefix
    pub path: String,
    /// Query parameters, in insertion order
    pub query: Vec<(String, String)>,
    /// JSON payload, if any
    pub body: Option<Value>,
    /// Outgoing headers keyed by lowercase name
    pub headers: BTreeMap<String, String>,
    /// Trace identifier shared by every attempt of this call
    pub trace_id: String,
    /// 1-based physical attempt number
    pub attempt: u32,
}

impl CallContext {
    /// Create a draft context with a fresh trace id and no headers
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            headers: BTreeMap::new(),
            trace_id: generate_trace_id(),
            attempt: 1,
        }
    }

    /// Attach a JSON payload
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Append query parameters
    pub fn with_query<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Set a header, replacing any previous value
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
    }

    /// Remove a header if present
    pub fn remove_header(&mut self, name: &str) {
        self.headers.remove(&name.to_ascii_lowercase());
    }

    /// Look up a header by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Whether repeating this call cannot duplicate a server-side effect
    pub fn is_idempotent(&self) -> bool {
        matches!(
            self.method,
            Method::GET | Method::HEAD | Method::OPTIONS | Method::PUT | Method::DELETE
        )
    }
}

impl fmt::Display for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} [{}#{}]", self.method, self.path, self.trace_id, self.attempt)
    }
}

/// An HTTP response described as plain data
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RawResponse {
    /// Create a response with no headers
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Create a response whose body is the serialized `value`
    pub fn json(status: u16, value: &Value) -> Self {
        Self::new(status, value.to_string())
    }

    /// Whether the status is in the 2xx range
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body.
    ///
    /// JSON when it parses, `Null` when empty, otherwise the raw text.
    pub fn decode_body(&self) -> Value {
        if self.body.trim().is_empty() {
            return Value::Null;
        }
        serde_json::from_str(&self.body).unwrap_or_else(|_| Value::String(self.body.clone()))
    }
}

/// A failed attempt, before normalization
#[derive(Debug, Clone, PartialEq)]
pub enum CallFailure {
    /// The server answered with a non-2xx status
    Status { status: u16, body: Value },
    /// The request was sent but no response arrived (timeout, reset, DNS, ...)
    NoResponse { reason: String },
    /// The request could not be constructed or dispatched
    Unsendable { reason: Option<String> },
}

impl CallFailure {
    /// Build a status failure from a non-2xx response
    pub fn from_response(response: &RawResponse) -> Self {
        Self::Status {
            status: response.status,
            body: response.decode_body(),
        }
    }

    /// Build an unsendable failure from any local error
    pub fn unsendable(error: impl fmt::Display) -> Self {
        let reason = error.to_string();
        Self::Unsendable {
            reason: (!reason.trim().is_empty()).then_some(reason),
        }
    }

    /// Server status, if the server responded
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether no response arrived at all
    pub fn is_no_response(&self) -> bool {
        matches!(self, Self::NoResponse { .. })
    }
}

impl fmt::Display for CallFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status { status, .. } => write!(f, "server responded with {status}"),
            Self::NoResponse { reason } => write!(f, "no response: {reason}"),
            Self::Unsendable { reason } => write!(
                f,
                "request not sent: {}",
                reason.as_deref().unwrap_or("unknown local failure")
            ),
        }
    }
}
