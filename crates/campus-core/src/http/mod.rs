//! HTTP client core shared by every domain service
//!
//! This module provides:
//! - Request decoration (bearer credential, trace id, platform/version tags)
//! - Retry logic with exponential backoff for transient failures
//! - Session invalidation when the server answers 401
//! - Error normalization into one [`NormalizedError`] shape
//! - Per-call cancellation

pub mod cancel;
pub mod client;
pub mod context;
pub mod error;
pub mod normalizer;
pub mod pipeline;
pub mod redact;
pub mod retry;
pub mod timeout;
pub mod transport;

pub use cancel::CancelHandle;
pub use client::{ApiClient, ApiClientBuilder, CallBuilder, PendingCall};
pub use context::{CallContext, CallFailure, RawResponse};
pub use error::{CallError, FailureKind, NormalizedError};
pub use normalizer::normalize;
pub use pipeline::{Outcome, RequestPipeline, RequestStep, ResponsePipeline, ResponseStep};
pub use retry::{MutationRetry, RetryDecision, RetryHandler, RetryPolicy};
pub use timeout::TimeoutConfig;
pub use transport::{ReqwestTransport, ScriptedReply, ScriptedTransport, Transport};

// Re-export commonly used types
pub use reqwest::Method;
