//! Authentication service

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::ServiceError;
use crate::http::{ApiClient, Method};

/// Body returned by `auth/login`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub user: Value,
}

/// Login, logout and current-user lookups
#[derive(Debug, Clone)]
pub struct AuthService {
    client: ApiClient,
}

impl AuthService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Authenticate and persist the issued token and user
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ServiceError> {
        let body = self
            .client
            .post("auth/login", &json!({ "email": email, "password": password }))
            .await?;
        let login: LoginResponse = serde_json::from_value(body)?;

        self.client
            .session()
            .save(&login.access_token, &login.user)
            .await?;
        tracing::info!("signed in");

        Ok(login)
    }

    /// End the session.
    ///
    /// The server is told on a best-effort basis; local credentials are
    /// cleared regardless of the outcome.
    pub async fn logout(&self) -> Result<(), ServiceError> {
        if let Err(e) = self.client.call(Method::POST, "auth/logout").send().await {
            tracing::debug!(error = %e, "server-side logout failed, clearing locally");
        }
        self.client.session().clear().await?;
        Ok(())
    }

    /// The authenticated user.
    ///
    /// Served from the cache unless `force_refresh` is set or nothing is
    /// cached; a fetched user replaces the cached one.
    pub async fn current_user(&self, force_refresh: bool) -> Result<Value, ServiceError> {
        if !force_refresh {
            if let Some(user) = self.client.session().cached_user().await? {
                return Ok(user);
            }
        }

        let body = self.client.get("auth/me").await?;
        let user = match body {
            Value::Object(mut map) if map.contains_key("user") => {
                map.remove("user").unwrap_or(Value::Null)
            }
            other => other,
        };
        self.client.session().save_user(&user).await?;
        Ok(user)
    }

    /// Whether a session token is stored
    pub async fn is_authenticated(&self) -> Result<bool, ServiceError> {
        Ok(self.client.session().token().await?.is_some())
    }
}
