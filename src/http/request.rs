//! Request description shared by the executor, deduplicator and cache layer.

use reqwest::Method;
use serde_json::Value;

use crate::auth::user_id_for;

/// One logical API call.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    pub method: Method,
    /// Path relative to the configured base URL, e.g. "/mealplans".
    pub endpoint: String,
    pub body: Option<Value>,
    /// Bearer token, read from the token store just before the call.
    pub token: Option<String>,
}

impl RequestSpec {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            body: None,
            token: None,
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::GET, endpoint)
    }

    pub fn post(endpoint: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, endpoint).with_body(body)
    }

    pub fn put(endpoint: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PUT, endpoint).with_body(body)
    }

    pub fn patch(endpoint: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PATCH, endpoint).with_body(body)
    }

    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(Method::DELETE, endpoint)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// User the request is made for, "anonymous" without a usable token.
    pub fn user_id(&self) -> String {
        user_id_for(self.token.as_deref())
    }

    /// Key under which identical in-flight requests are shared.
    ///
    /// `<user>|<METHOD>:<url>:<json body>`. The user prefix keeps two
    /// accounts on one client from sharing each other's responses.
    pub fn dedup_key(&self, url: &str) -> String {
        let body = self
            .body
            .as_ref()
            .map(Value::to_string)
            .unwrap_or_default();
        format!("{}|{}:{}:{}", self.user_id(), self.method, url, body)
    }
}
