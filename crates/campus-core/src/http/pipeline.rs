//! Ordered request and response pipelines
//!
//! A [`RequestPipeline`] is a list of [`RequestStep`]s, each taking a
//! [`CallContext`] and returning the decorated context. A
//! [`ResponsePipeline`] is a list of [`ResponseStep`]s that observe the
//! settled [`Outcome`] and pass it on. Steps run strictly in order, so the
//! order in which they are pushed is the order their effects happen.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::http::context::{
    CallContext, CallFailure, RawResponse, AUTHORIZATION, CLIENT_VERSION, CONTENT_TYPE, PLATFORM,
    REQUEST_ID,
};
use crate::http::redact::{redact_headers, redact_json_value, redact_query, redact_sensitive};
use crate::store::Session;

/// Result of one settled attempt, before normalization
pub type Outcome = Result<RawResponse, CallFailure>;

/// Content type declared on every call
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// A step applied to every outgoing attempt
#[async_trait]
pub trait RequestStep: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Decorate `context`, or fail the attempt before it is sent
    async fn apply(&self, context: CallContext) -> Result<CallContext, CallFailure>;
}

/// A step applied to every settled call
#[async_trait]
pub trait ResponseStep: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Observe `outcome` and return it, possibly after side effects
    async fn observe(&self, context: &CallContext, outcome: Outcome) -> Outcome;
}

/// Ordered list of request steps
#[derive(Clone, Default)]
pub struct RequestPipeline {
    steps: Vec<Arc<dyn RequestStep>>,
}

impl RequestPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credentials, tracing/platform headers, then the developer trace log
    pub fn standard(config: &ClientConfig, session: Session) -> Self {
        Self::new()
            .push(AttachCredentials::new(session))
            .push(StampHeaders::from_config(config))
            .push(TraceRequest::new(config.developer_mode()))
    }

    /// Append a step
    pub fn push(mut self, step: impl RequestStep + 'static) -> Self {
        self.steps.push(Arc::new(step));
        self
    }

    /// Names of the steps, in order
    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run every step in order, stopping at the first failure
    pub async fn run(&self, mut context: CallContext) -> Result<CallContext, CallFailure> {
        for step in &self.steps {
            context = step.apply(context).await?;
        }
        Ok(context)
    }
}

/// Ordered list of response steps
#[derive(Clone, Default)]
pub struct ResponsePipeline {
    steps: Vec<Arc<dyn ResponseStep>>,
}

impl ResponsePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Developer trace log, session invalidation on 401, failure recording
    pub fn standard(config: &ClientConfig, session: Session) -> Self {
        Self::new()
            .push(TraceResponse::new(config.developer_mode()))
            .push(ClearSessionOnUnauthorized::new(session))
            .push(RecordFailure)
    }

    /// Append a step
    pub fn push(mut self, step: impl ResponseStep + 'static) -> Self {
        self.steps.push(Arc::new(step));
        self
    }

    /// Names of the steps, in order
    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Pass `outcome` through every step in order
    pub async fn run(&self, context: &CallContext, mut outcome: Outcome) -> Outcome {
        for step in &self.steps {
            outcome = step.observe(context, outcome).await;
        }
        outcome
    }
}

/// Attaches the stored session token as a bearer credential.
///
/// A missing token is not an error; the backend decides whether the call
/// needs one. A store that cannot be read fails the attempt as unsendable.
pub struct AttachCredentials {
    session: Session,
}

impl AttachCredentials {
    pub fn new(session: Session) -> Self {
        Self { session }
    }
}

#[async_trait]
impl RequestStep for AttachCredentials {
    fn name(&self) -> &'static str {
        "attach_credentials"
    }

    async fn apply(&self, mut context: CallContext) -> Result<CallContext, CallFailure> {
        match self.session.token().await {
            Ok(Some(token)) => context.set_header(AUTHORIZATION, format!("Bearer {token}")),
            Ok(None) => context.remove_header(AUTHORIZATION),
            Err(e) => {
                return Err(CallFailure::unsendable(format!(
                    "could not read stored credentials: {e}"
                )))
            }
        }
        Ok(context)
    }
}

/// Sets the trace id, platform, client version and content type headers
pub struct StampHeaders {
    platform: String,
    client_version: String,
}

impl StampHeaders {
    pub fn new(platform: impl Into<String>, client_version: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            client_version: client_version.into(),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.platform.clone(), config.client_version.clone())
    }
}

#[async_trait]
impl RequestStep for StampHeaders {
    fn name(&self) -> &'static str {
        "stamp_headers"
    }

    async fn apply(&self, mut context: CallContext) -> Result<CallContext, CallFailure> {
        let trace_id = context.trace_id.clone();
        context.set_header(REQUEST_ID, trace_id);
        context.set_header(PLATFORM, self.platform.clone());
        context.set_header(CLIENT_VERSION, self.client_version.clone());
        context.set_header(CONTENT_TYPE, JSON_CONTENT_TYPE);
        Ok(context)
    }
}

/// Developer-mode log of every outgoing attempt
pub struct TraceRequest {
    enabled: bool,
}

impl TraceRequest {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

#[async_trait]
impl RequestStep for TraceRequest {
    fn name(&self) -> &'static str {
        "trace_request"
    }

    async fn apply(&self, context: CallContext) -> Result<CallContext, CallFailure> {
        if self.enabled {
            let mut body = context.body.clone().unwrap_or(Value::Null);
            redact_json_value(&mut body);
            tracing::debug!(
                method = %context.method,
                path = %redact_sensitive(&context.path),
                query = ?redact_query(&context.query),
                body = %body,
                headers = ?redact_headers(&context.headers),
                trace_id = %context.trace_id,
                attempt = context.attempt,
                "API request"
            );
        }
        Ok(context)
    }
}

/// Developer-mode log of every settled call
pub struct TraceResponse {
    enabled: bool,
}

impl TraceResponse {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

#[async_trait]
impl ResponseStep for TraceResponse {
    fn name(&self) -> &'static str {
        "trace_response"
    }

    async fn observe(&self, context: &CallContext, outcome: Outcome) -> Outcome {
        if !self.enabled {
            return outcome;
        }
        match &outcome {
            Ok(response) => {
                let mut body = response.decode_body();
                redact_json_value(&mut body);
                tracing::debug!(
                    method = %context.method,
                    path = %redact_sensitive(&context.path),
                    status = response.status,
                    body = %body,
                    trace_id = %context.trace_id,
                    attempt = context.attempt,
                    "API response"
                );
            }
            Err(failure) => tracing::debug!(
                method = %context.method,
                path = %redact_sensitive(&context.path),
                failure = %failure,
                trace_id = %context.trace_id,
                attempt = context.attempt,
                "API failure"
            ),
        }
        outcome
    }
}

/// Clears the token and cached user when the server answers 401
pub struct ClearSessionOnUnauthorized {
    session: Session,
}

impl ClearSessionOnUnauthorized {
    pub fn new(session: Session) -> Self {
        Self { session }
    }
}

#[async_trait]
impl ResponseStep for ClearSessionOnUnauthorized {
    fn name(&self) -> &'static str {
        "clear_session_on_unauthorized"
    }

    async fn observe(&self, context: &CallContext, outcome: Outcome) -> Outcome {
        if let Err(CallFailure::Status { status: 401, .. }) = &outcome {
            tracing::info!(trace_id = %context.trace_id, "session rejected by server, clearing credentials");
            if let Err(e) = self.session.clear().await {
                tracing::warn!(error = %e, trace_id = %context.trace_id, "failed to clear credentials");
            }
        }
        outcome
    }
}

/// Records notable server rejections for observability
pub struct RecordFailure;

#[async_trait]
impl ResponseStep for RecordFailure {
    fn name(&self) -> &'static str {
        "record_failure"
    }

    async fn observe(&self, context: &CallContext, outcome: Outcome) -> Outcome {
        if let Err(CallFailure::Status { status, .. }) = &outcome {
            let label = match status {
                403 => Some("forbidden"),
                404 => Some("not found"),
                429 => Some("rate limited"),
                500..=599 => Some("server error"),
                _ => None,
            };
            if let Some(label) = label {
                tracing::warn!(
                    status = *status,
                    method = %context.method,
                    path = %redact_sensitive(&context.path),
                    trace_id = %context.trace_id,
                    "API request failed: {label}"
                );
            }
        }
        outcome
    }
}
