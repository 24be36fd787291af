//! The physical send
//!
//! [`Transport`] performs exactly one attempt for an already-decorated
//! [`CallContext`]. Retries, timeouts and session handling live above it in
//! [`crate::http::ApiClient`], so any implementation gets them for free.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde_json::Value;
use url::Url;

use crate::config::{resolve_under, ClientConfig};
use crate::error::{Error, Result};
use crate::http::context::{CallContext, CallFailure, RawResponse};

/// One physical HTTP attempt
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `context` and return whatever the server answered.
    ///
    /// Non-2xx responses are returned as `Ok`; only attempts that got no
    /// response, or never left the device, are `Err`.
    async fn send(&self, context: &CallContext) -> std::result::Result<RawResponse, CallFailure>;
}

/// Transport backed by `reqwest`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: ReqwestClient,
    base_url: Url,
}

impl ReqwestTransport {
    /// Build a transport for `config`
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = ReqwestClient::builder()
            .timeout(config.timeouts.request_timeout)
            .connect_timeout(config.timeouts.connect_timeout)
            .build()
            .map_err(|e| Error::HttpClient {
                message: format!("Failed to create HTTP client: {e}"),
                source: Some(e),
            })?;

        let base_url = config
            .base_url()
            .map_err(|e| Error::configuration(format!("invalid base URL: {e}")))?;

        Ok(Self { client, base_url })
    }

    /// Absolute base URL calls are resolved against
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn build_request(
        &self,
        context: &CallContext,
    ) -> std::result::Result<reqwest::Request, CallFailure> {
        let url = resolve_under(&self.base_url, &context.path).map_err(CallFailure::unsendable)?;

        let mut builder = self.client.request(context.method.clone(), url);

        for (name, value) in &context.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if !context.query.is_empty() {
            builder = builder.query(&context.query);
        }

        if let Some(body) = &context.body {
            builder = builder.body(body.to_string());
        }

        builder.build().map_err(classify_error)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, context: &CallContext) -> std::result::Result<RawResponse, CallFailure> {
        let request = self.build_request(context)?;
        let response = self.client.execute(request).await.map_err(classify_error)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.text().await.map_err(classify_error)?;

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

/// Map a reqwest error onto the failure taxonomy.
///
/// Anything not recognised as a transport-level loss is treated as a local
/// failure.
fn classify_error(error: reqwest::Error) -> CallFailure {
    if error.is_builder() {
        CallFailure::unsendable(error)
    } else if error.is_timeout()
        || error.is_connect()
        || error.is_request()
        || error.is_body()
        || error.is_decode()
    {
        CallFailure::NoResponse {
            reason: error.to_string(),
        }
    } else {
        CallFailure::unsendable(error)
    }
}

/// A reply queued on a [`ScriptedTransport`]
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Answer with this response
    Respond(RawResponse),
    /// Fail the attempt
    Fail(CallFailure),
    /// Never answer
    Hang,
}

/// In-memory transport that replays queued replies and records every
/// attempt. Intended for tests of domain services built on the client.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<ScriptedReply>>,
    seen: Mutex<Vec<(tokio::time::Instant, CallContext)>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a JSON response
    pub fn respond(&self, status: u16, body: Value) -> &Self {
        self.push(ScriptedReply::Respond(RawResponse::json(status, &body)))
    }

    /// Queue an attempt that gets no response
    pub fn drop_connection(&self) -> &Self {
        self.push(ScriptedReply::Fail(CallFailure::NoResponse {
            reason: "connection reset by peer".to_string(),
        }))
    }

    /// Queue an attempt that never completes
    pub fn hang(&self) -> &Self {
        self.push(ScriptedReply::Hang)
    }

    /// Queue an arbitrary reply
    pub fn push(&self, reply: ScriptedReply) -> &Self {
        self.replies
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(reply);
        self
    }

    /// Contexts of every attempt, in order
    pub fn requests(&self) -> Vec<CallContext> {
        self.seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|(_, ctx)| ctx.clone())
            .collect()
    }

    /// Instants at which each attempt started
    pub fn attempt_times(&self) -> Vec<tokio::time::Instant> {
        self.seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|(at, _)| *at)
            .collect()
    }

    /// Number of attempts seen so far
    pub fn attempts(&self) -> usize {
        self.seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, context: &CallContext) -> std::result::Result<RawResponse, CallFailure> {
        self.seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((tokio::time::Instant::now(), context.clone()));

        let reply = self
            .replies
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front();

        match reply {
            Some(ScriptedReply::Respond(response)) => Ok(response),
            Some(ScriptedReply::Fail(failure)) => Err(failure),
            Some(ScriptedReply::Hang) => std::future::pending().await,
            None => Err(CallFailure::unsendable("scripted transport has no reply queued")),
        }
    }
}
