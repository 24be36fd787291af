//! The Transport Core every domain service calls through
//!
//! [`ApiClient`] composes, for each call:
//!
//! 1. the [`RequestPipeline`] (once per physical attempt),
//! 2. the [`Transport`] send under the per-attempt timeout,
//! 3. the [`RetryHandler`] around 1-2 for transient failures,
//! 4. the [`ResponsePipeline`] on the settled outcome,
//! 5. [`normalize`] on failure.
//!
//! Callers get the decoded success body or a [`CallError`]. Cancelling a
//! call through its [`CancelHandle`] settles it with [`CallError::Cancelled`]
//! and stops any pending retry.

use std::sync::Arc;

use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::Result;
use crate::http::cancel::CancelHandle;
use crate::http::context::{CallContext, CallFailure};
use crate::http::error::{CallError, NormalizedError, STATUS_UNSENDABLE};
use crate::http::normalizer::normalize;
use crate::http::pipeline::{
    Outcome, RequestPipeline, RequestStep, ResponsePipeline, ResponseStep,
};
use crate::http::retry::{RetryDecision, RetryHandler};
use crate::http::timeout::with_timeout;
use crate::http::transport::{ReqwestTransport, Transport};
use crate::store::{CredentialStore, MemoryCredentialStore, Session};

/// Shared, cheaply cloneable client. One per process is the expected usage.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

struct Inner {
    config: ClientConfig,
    session: Session,
    transport: Arc<dyn Transport>,
    request_pipeline: RequestPipeline,
    response_pipeline: ResponsePipeline,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("environment", &self.inner.config.environment)
            .field("origin", &self.inner.config.origin.as_str())
            .field("request_steps", &self.inner.request_pipeline.step_names())
            .field("response_steps", &self.inner.response_pipeline.step_names())
            .finish()
    }
}

impl ApiClient {
    /// Client over the reqwest transport
    pub fn new(config: ClientConfig, store: Arc<dyn CredentialStore>) -> Result<Self> {
        Self::builder(config).credential_store(store).build()
    }

    /// Start building a client
    pub fn builder(config: ClientConfig) -> ApiClientBuilder {
        ApiClientBuilder::new(config)
    }

    /// Configuration the client was built with
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Session stored alongside the client
    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    /// Prepare a call; see [`CallBuilder`]
    pub fn call(&self, method: Method, path: impl Into<String>) -> CallBuilder {
        CallBuilder {
            client: self.clone(),
            context: CallContext::new(method, path),
            body_error: None,
            cancel: CancelHandle::new(),
        }
    }

    /// `GET path`
    pub async fn get(&self, path: &str) -> std::result::Result<Value, CallError> {
        self.call(Method::GET, path).send().await
    }

    /// `GET path?query`
    pub async fn get_with_query(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> std::result::Result<Value, CallError> {
        self.call(Method::GET, path)
            .query(query.iter().copied())
            .send()
            .await
    }

    /// `POST path` with a JSON body
    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> std::result::Result<Value, CallError> {
        self.call(Method::POST, path).json(body).send().await
    }

    /// `PUT path` with a JSON body
    pub async fn put<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> std::result::Result<Value, CallError> {
        self.call(Method::PUT, path).json(body).send().await
    }

    /// `PATCH path` with a JSON body
    pub async fn patch<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> std::result::Result<Value, CallError> {
        self.call(Method::PATCH, path).json(body).send().await
    }

    /// `DELETE path`
    pub async fn delete(&self, path: &str) -> std::result::Result<Value, CallError> {
        self.call(Method::DELETE, path).send().await
    }

    async fn execute(
        &self,
        draft: CallContext,
        body_error: Option<CallFailure>,
        cancel: CancelHandle,
    ) -> std::result::Result<Value, CallError> {
        if cancel.is_cancelled() {
            return Err(CallError::Cancelled);
        }

        let (context, outcome) = match body_error {
            Some(failure) => (draft, Err(failure)),
            None => {
                let settled = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    settled = self.attempt_with_retry(draft, &cancel) => settled,
                };
                match settled {
                    Some(settled) => settled,
                    None => {
                        tracing::debug!("call cancelled by issuer");
                        return Err(CallError::Cancelled);
                    }
                }
            }
        };

        match self.inner.response_pipeline.run(&context, outcome).await {
            Ok(response) => Ok(response.decode_body()),
            Err(failure) => Err(CallError::Failed(normalize(&failure))),
        }
    }

    /// Attempt until success, a terminal failure or an exhausted budget.
    ///
    /// Returns `None` if cancelled while waiting out a backoff delay.
    async fn attempt_with_retry(
        &self,
        mut draft: CallContext,
        cancel: &CancelHandle,
    ) -> Option<(CallContext, Outcome)> {
        let mut retry = RetryHandler::new(self.inner.config.retry_policy.clone());

        loop {
            let (context, outcome) = self.attempt(draft.clone()).await;
            let failure = match &outcome {
                Ok(_) => return Some((context, outcome)),
                Err(failure) => failure,
            };

            match retry.should_retry(&context, failure) {
                RetryDecision::Retry { delay } => {
                    tracing::warn!(
                        method = %context.method,
                        path = %context.path,
                        trace_id = %context.trace_id,
                        attempt = context.attempt,
                        delay_ms = delay.as_millis() as u64,
                        reason = %failure,
                        "request failed, retrying"
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return None,
                        _ = tokio::time::sleep(delay) => {}
                    }
                    draft.attempt += 1;
                }
                RetryDecision::NoRetry => {
                    if retry.retries() > 0 {
                        tracing::warn!(
                            method = %context.method,
                            path = %context.path,
                            trace_id = %context.trace_id,
                            attempts = context.attempt,
                            reason = %failure,
                            "request failed after retries"
                        );
                    }
                    return Some((context, outcome));
                }
            }
        }
    }

    /// One physical attempt: decorate, send under the timeout, classify
    async fn attempt(&self, draft: CallContext) -> (CallContext, Outcome) {
        let context = match self.inner.request_pipeline.run(draft.clone()).await {
            Ok(context) => context,
            Err(failure) => return (draft, Err(failure)),
        };

        let timeouts = &self.inner.config.timeouts;
        let outcome = match with_timeout(self.inner.transport.send(&context), timeouts).await {
            Ok(Ok(response)) if response.is_success() => Ok(response),
            Ok(Ok(response)) => Err(CallFailure::from_response(&response)),
            Ok(Err(failure)) => Err(failure),
            Err(_) => Err(CallFailure::NoResponse {
                reason: format!("no response within {:?}", timeouts.request_timeout),
            }),
        };

        (context, outcome)
    }
}

/// A call being prepared
pub struct CallBuilder {
    client: ApiClient,
    context: CallContext,
    body_error: Option<CallFailure>,
    cancel: CancelHandle,
}

impl CallBuilder {
    /// Append query parameters
    pub fn query<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.context = self.context.with_query(params);
        self
    }

    /// Attach a JSON body.
    ///
    /// A body that cannot be serialized fails the call as unsendable.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Self {
        match serde_json::to_value(body) {
            Ok(value) => self.context = self.context.with_body(value),
            Err(e) => {
                self.body_error = Some(CallFailure::unsendable(format!(
                    "could not serialize request body: {e}"
                )))
            }
        }
        self
    }

    /// Cancel this call through an existing handle
    pub fn cancel_with(mut self, handle: &CancelHandle) -> Self {
        self.cancel = handle.clone();
        self
    }

    /// Handle that cancels this call
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Trace id shared by every attempt of this call
    pub fn trace_id(&self) -> &str {
        &self.context.trace_id
    }

    /// Run the call on the current task
    pub async fn send(self) -> std::result::Result<Value, CallError> {
        self.client
            .execute(self.context, self.body_error, self.cancel)
            .await
    }

    /// Run the call on a background task and return a handle to it
    pub fn spawn(self) -> PendingCall {
        let cancel = self.cancel.clone();
        let task = tokio::spawn(self.send());
        PendingCall { cancel, task }
    }
}

/// A call running in the background
#[derive(Debug)]
pub struct PendingCall {
    cancel: CancelHandle,
    task: tokio::task::JoinHandle<std::result::Result<Value, CallError>>,
}

impl PendingCall {
    /// Handle that cancels this call
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Cancel the call. A no-op once it has settled.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the call to settle
    pub async fn wait(self) -> std::result::Result<Value, CallError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(CallError::Cancelled),
            Err(e) => Err(CallError::Failed(NormalizedError {
                status: STATUS_UNSENDABLE,
                message: format!("request task failed: {e}"),
                validation_errors: None,
                is_network_error: false,
            })),
        }
    }
}

/// Builder for [`ApiClient`]
pub struct ApiClientBuilder {
    config: ClientConfig,
    store: Option<Arc<dyn CredentialStore>>,
    transport: Option<Arc<dyn Transport>>,
    request_steps: Vec<Box<dyn FnOnce(RequestPipeline) -> RequestPipeline + Send>>,
    response_steps: Vec<Box<dyn FnOnce(ResponsePipeline) -> ResponsePipeline + Send>>,
}

impl ApiClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            store: None,
            transport: None,
            request_steps: Vec::new(),
            response_steps: Vec::new(),
        }
    }

    /// Store holding the session. Defaults to an in-memory store.
    pub fn credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Transport performing physical sends. Defaults to reqwest.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Append a request step after the standard ones
    pub fn request_step(mut self, step: impl RequestStep + 'static) -> Self {
        self.request_steps.push(Box::new(move |p| p.push(step)));
        self
    }

    /// Append a response step after the standard ones
    pub fn response_step(mut self, step: impl ResponseStep + 'static) -> Self {
        self.response_steps.push(Box::new(move |p| p.push(step)));
        self
    }

    /// Validate the configuration and assemble the client
    pub fn build(self) -> Result<ApiClient> {
        self.config.validate()?;

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryCredentialStore::new()));
        let session = Session::new(store);

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(&self.config)?),
        };

        let request_pipeline = self.request_steps.into_iter().fold(
            RequestPipeline::standard(&self.config, session.clone()),
            |pipeline, add| add(pipeline),
        );
        let response_pipeline = self.response_steps.into_iter().fold(
            ResponsePipeline::standard(&self.config, session.clone()),
            |pipeline, add| add(pipeline),
        );

        tracing::debug!(
            environment = %self.config.environment,
            origin = %self.config.origin,
            developer_mode = self.config.developer_mode(),
            "API client initialized"
        );

        Ok(ApiClient {
            inner: Arc::new(Inner {
                config: self.config,
                session,
                transport,
                request_pipeline,
                response_pipeline,
            }),
        })
    }
}
