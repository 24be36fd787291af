//! Client configuration
//!
//! Resolved once by the process entry point and handed to
//! [`crate::http::ApiClient`] at construction. The library never reads
//! ambient environment variables itself.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::http::retry::RetryPolicy;
use crate::http::timeout::TimeoutConfig;

/// Default versioned API prefix
pub const DEFAULT_API_PREFIX: &str = "/api/v1";
/// Default platform tag sent with every call
pub const DEFAULT_PLATFORM: &str = "mobile";
/// Client version sent with every call
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    /// Fixed origin for this environment
    pub fn origin(&self) -> &'static str {
        match self {
            Environment::Development => "http://localhost:8000",
            Environment::Staging => "https://staging-api.campus-admin.app",
            Environment::Production => "https://api.campus-admin.app",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Staging => write!(f, "staging"),
            Environment::Production => write!(f, "production"),
        }
    }
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Development),
            "staging" | "stage" => Ok(Environment::Staging),
            "prod" | "production" => Ok(Environment::Production),
            other => Err(Error::configuration(format!(
                "unknown environment '{other}' (expected development, staging or production)"
            ))),
        }
    }
}

/// Configuration for [`crate::http::ApiClient`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Deployment environment
    pub environment: Environment,
    /// Origin the API prefix is appended to
    pub origin: Url,
    /// Versioned API prefix, e.g. `/api/v1`
    pub api_prefix: String,
    /// Per-attempt timeouts
    pub timeouts: TimeoutConfig,
    /// Retry policy for transient failures
    pub retry_policy: RetryPolicy,
    /// Platform tag header value
    pub platform: String,
    /// Client version header value
    pub client_version: String,
    /// Emit request/response trace logs. Ignored in production.
    pub developer_mode: bool,
}

impl ClientConfig {
    /// Configuration for a deployment environment
    pub fn for_environment(environment: Environment) -> Self {
        Self {
            environment,
            origin: Url::parse(environment.origin()).expect("Valid environment origin"),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            timeouts: TimeoutConfig::default(),
            retry_policy: RetryPolicy::default(),
            platform: DEFAULT_PLATFORM.to_string(),
            client_version: CLIENT_VERSION.to_string(),
            developer_mode: environment == Environment::Development,
        }
    }

    /// Override the origin (self-hosted backends, local mock servers)
    pub fn with_origin(mut self, origin: &str) -> Result<Self> {
        self.origin = Url::parse(origin)
            .map_err(|e| Error::configuration(format!("invalid origin '{origin}': {e}")))?;
        Ok(self)
    }

    /// Set the API prefix
    pub fn with_api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_prefix = prefix.into();
        self
    }

    /// Set the retry policy
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Set the per-attempt request ceiling
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts = self.timeouts.with_request_timeout(timeout);
        if self.timeouts.connect_timeout > timeout {
            self.timeouts.connect_timeout = timeout;
        }
        self
    }

    /// Set the platform tag
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    /// Set the client version tag
    pub fn with_client_version(mut self, version: impl Into<String>) -> Self {
        self.client_version = version.into();
        self
    }

    /// Enable or disable developer-mode trace logging
    pub fn with_developer_mode(mut self, enabled: bool) -> Self {
        self.developer_mode = enabled;
        self
    }

    /// Whether trace logs are emitted. Always false in production.
    pub fn developer_mode(&self) -> bool {
        self.developer_mode && self.environment != Environment::Production
    }

    /// Absolute base URL: origin plus API prefix, with a trailing slash
    pub fn base_url(&self) -> std::result::Result<Url, url::ParseError> {
        let prefix = self.api_prefix.trim_matches('/');
        if prefix.is_empty() {
            return Ok(self.origin.clone());
        }
        self.origin.join(&format!("/{prefix}/"))
    }

    /// Absolute URL for a path relative to the API prefix
    pub fn endpoint_url(&self, path: &str) -> Result<Url> {
        let base = self
            .base_url()
            .map_err(|e| Error::configuration(format!("invalid base URL: {e}")))?;
        resolve_under(&base, path).map_err(Error::configuration)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.timeouts.validate().map_err(Error::configuration)?;

        if self.retry_policy.max_retries > 0 && self.retry_policy.base_delay.is_zero() {
            return Err(Error::configuration("retry base delay cannot be zero"));
        }

        if self.retry_policy.multiplier < 1.0 {
            return Err(Error::configuration("retry multiplier must be at least 1.0"));
        }

        if !self.retry_policy.jitter && self.retry_policy.last_delay() > self.retry_policy.max_delay {
            return Err(Error::configuration(format!(
                "retry delays would plateau at the {:?} cap; raise max_delay or lower base_delay",
                self.retry_policy.max_delay
            )));
        }

        self.base_url()
            .map_err(|e| Error::configuration(format!("invalid API prefix: {e}")))?;

        Ok(())
    }
}

/// Resolve `path` beneath `base`.
///
/// Absolute URLs, scheme-relative paths and dot segments are refused, and the
/// result must stay under `base`, so a caller-supplied path can never move
/// the bearer credential to another host or out of the API prefix.
pub fn resolve_under(base: &Url, path: &str) -> std::result::Result<Url, String> {
    let outside = || format!("path '{path}' is not relative to the API base");

    if path.starts_with("//") || path.starts_with("\\\\") || Url::parse(path).is_ok() {
        return Err(outside());
    }

    let route = path.split(['?', '#']).next().unwrap_or_default();
    if route.split(['/', '\\']).any(is_dot_segment) {
        return Err(outside());
    }

    let url = base
        .join(path.trim_start_matches('/'))
        .map_err(|e| format!("invalid path '{path}': {e}"))?;

    if url.origin() != base.origin() || !url.path().starts_with(base.path()) {
        return Err(outside());
    }
    Ok(url)
}

fn is_dot_segment(segment: &str) -> bool {
    let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
    decoded == "." || decoded == ".."
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parsing() {
        assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Development);
        assert_eq!("Staging".parse::<Environment>().unwrap(), Environment::Staging);
        assert_eq!(" PROD ".parse::<Environment>().unwrap(), Environment::Production);
        assert!("qa".parse::<Environment>().is_err());
    }

    #[test]
    fn test_endpoint_url() {
        let config = ClientConfig::for_environment(Environment::Production);
        assert_eq!(
            config.endpoint_url("students").unwrap().as_str(),
            "https://api.campus-admin.app/api/v1/students"
        );
        assert_eq!(
            config.endpoint_url("/students/7/fees").unwrap().as_str(),
            "https://api.campus-admin.app/api/v1/students/7/fees"
        );
    }

    #[test]
    fn test_paths_cannot_leave_the_api_base() {
        let config = ClientConfig::for_environment(Environment::Staging);
        for path in [
            "https://evil.example/steal",
            "//evil.example/x",
            "a/../../x",
            "students/../../../admin",
            "students/%2e%2e/%2E%2E/admin",
            "students\\..\\..\\admin",
            "mailto:someone@example.com",
        ] {
            let err = config.endpoint_url(path).unwrap_err();
            assert!(err.to_string().contains("not relative"), "{path}: {err}");
        }

        assert_eq!(
            config.endpoint_url("students?sort=-name").unwrap().as_str(),
            "https://staging-api.campus-admin.app/api/v1/students?sort=-name"
        );
    }

    #[test]
    fn test_origin_override_keeps_prefix() {
        let config = ClientConfig::for_environment(Environment::Development)
            .with_origin("http://127.0.0.1:4010/base/")
            .unwrap();
        assert_eq!(
            config.endpoint_url("auth/login").unwrap().as_str(),
            "http://127.0.0.1:4010/api/v1/auth/login"
        );
        assert!(ClientConfig::for_environment(Environment::Staging)
            .with_origin("not a url")
            .is_err());
    }

    #[test]
    fn test_developer_mode_never_in_production() {
        assert!(ClientConfig::for_environment(Environment::Development).developer_mode());
        assert!(!ClientConfig::for_environment(Environment::Staging).developer_mode());
        assert!(ClientConfig::for_environment(Environment::Staging)
            .with_developer_mode(true)
            .developer_mode());
        assert!(!ClientConfig::for_environment(Environment::Production)
            .with_developer_mode(true)
            .developer_mode());
    }

    #[test]
    fn test_defaults_and_validation() {
        let config = ClientConfig::for_environment(Environment::Staging);
        assert_eq!(config.timeouts.request_timeout, Duration::from_secs(15));
        assert_eq!(config.retry_policy.max_retries, 3);
        assert_eq!(config.platform, "mobile");
        assert!(config.validate().is_ok());

        let bad = config
            .clone()
            .with_retry_policy(RetryPolicy::default().with_base_delay(Duration::ZERO));
        assert!(bad.validate().is_err());

        let plateau = config
            .clone()
            .with_retry_policy(RetryPolicy::default().with_base_delay(Duration::from_secs(20)));
        assert!(plateau
            .validate()
            .unwrap_err()
            .to_string()
            .contains("plateau"));
        let jittered = config.clone().with_retry_policy(
            RetryPolicy::default()
                .with_base_delay(Duration::from_secs(20))
                .with_jitter(true),
        );
        assert!(jittered.validate().is_ok());

        let short = config.with_request_timeout(Duration::from_secs(2));
        assert_eq!(short.timeouts.connect_timeout, Duration::from_secs(2));
        assert!(short.validate().is_ok());
    }
}
