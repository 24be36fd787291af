//! Per-attempt timeout configuration
//!
//! Every physical attempt runs under a fixed ceiling. An attempt that exceeds
//! it is reported as "no response arrived" and is eligible for retry.

use std::time::Duration;
use serde::{Deserialize, Serialize};

/// Timeout configuration for HTTP attempts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Connection timeout - time to establish a connection
    pub connect_timeout: Duration,
    /// Request timeout - ceiling for one whole attempt
    pub request_timeout: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(15),
        }
    }
}

impl TimeoutConfig {
    /// Create a new timeout configuration
    pub fn new(connect_timeout: Duration, request_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            request_timeout,
        }
    }

    /// Override the request timeout
    pub fn with_request_timeout(&self, timeout: Duration) -> Self {
        let mut config = self.clone();
        config.request_timeout = timeout;
        config
    }

    /// Validate timeout configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.connect_timeout.is_zero() {
            return Err("Connect timeout cannot be zero".to_string());
        }

        if self.request_timeout.is_zero() {
            return Err("Request timeout cannot be zero".to_string());
        }

        if self.request_timeout < self.connect_timeout {
            return Err("Request timeout should be >= connect timeout".to_string());
        }

        Ok(())
    }
}

/// Run `future` under the configured request ceiling
pub async fn with_timeout<F, T>(
    future: F,
    timeout_config: &TimeoutConfig,
) -> Result<T, tokio::time::error::Elapsed>
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(timeout_config.request_timeout, future).await
}
