//! Student records

use std::fmt::Display;

use serde_json::Value;

use crate::http::{ApiClient, CallError};

/// Student listing and lookup
#[derive(Debug, Clone)]
pub struct StudentService {
    client: ApiClient,
}

impl StudentService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// `GET students` with optional filters (`class`, `page`, ...)
    pub async fn list(&self, query: &[(&str, &str)]) -> Result<Value, CallError> {
        self.client.get_with_query("students", query).await
    }

    /// `GET students/{id}`
    pub async fn get(&self, id: impl Display) -> Result<Value, CallError> {
        self.client.get(&format!("students/{id}")).await
    }
}
