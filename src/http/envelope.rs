//! Uniform response envelope and error-message construction.
//!
//! Every request path, cached or not, resolves to an [`ApiResponse`]. Error
//! text is assembled here and nowhere else.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Failure classification carried by unsuccessful envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Refused before any network I/O, or 429 on every attempt.
    RateLimited,
    /// Non-retryable 4xx.
    Client,
    /// Server errors or transport failures used up the attempt budget.
    Offline,
    /// The request could not be built or its task died.
    Internal,
}

/// `{ success, data | error, status?, offline, fromCache }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T = Value> {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// HTTP status of the final attempt, when one was received.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    #[serde(default)]
    pub offline: bool,

    #[serde(default)]
    pub from_cache: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<FailureKind>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            status: None,
            offline: false,
            from_cache: false,
            kind: None,
        }
    }

    pub fn failure(kind: FailureKind, error: impl Into<String>, status: Option<u16>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            status,
            offline: kind == FailureKind::Offline,
            from_cache: false,
            kind: Some(kind),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Mark as served from the cache.
    pub fn cached(mut self) -> Self {
        self.from_cache = true;
        self
    }

    /// Transform the payload, keeping every other field.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResponse<U> {
        ApiResponse {
            success: self.success,
            data: self.data.map(f),
            error: self.error,
            status: self.status,
            offline: self.offline,
            from_cache: self.from_cache,
            kind: self.kind,
        }
    }

    /// Replace the payload.
    pub fn with_data<U>(self, data: Option<U>) -> ApiResponse<U> {
        ApiResponse {
            success: self.success,
            data,
            error: self.error,
            status: self.status,
            offline: self.offline,
            from_cache: self.from_cache,
            kind: self.kind,
        }
    }
}

/// Parse a response body. Empty bodies become `null`, non-JSON text a JSON string.
pub fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// Build the error string for a failed response.
///
/// `"<message>: <detail1>, <detail2>"` where the message comes from
/// `message` or `error`, and details from `details` or `errors` (an array of
/// strings or `{msg}` objects, or an object of messages).
pub fn build_error_message(body: &Value, status: u16) -> String {
    let primary = primary_message(body)
        .unwrap_or_else(|| format!("Request failed with status {}", status));

    let details = body
        .get("details")
        .or_else(|| body.get("errors"))
        .map(detail_messages)
        .unwrap_or_default();

    if details.is_empty() {
        primary
    } else {
        format!("{}: {}", primary, details.join(", "))
    }
}

fn primary_message(body: &Value) -> Option<String> {
    match body {
        Value::Object(map) => ["message", "error"]
            .iter()
            .find_map(|field| non_empty_str(map.get(*field)?))
            .or_else(|| {
                map.get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(non_empty_str)
            }),
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        _ => None,
    }
}

fn detail_messages(details: &Value) -> Vec<String> {
    match details {
        Value::Array(items) => items.iter().filter_map(item_message).collect(),
        Value::Object(map) => map
            .values()
            .flat_map(|value| match value {
                Value::Array(items) => items.iter().filter_map(item_message).collect::<Vec<_>>(),
                other => item_message(other).into_iter().collect(),
            })
            .collect(),
        other => item_message(other).into_iter().collect(),
    }
}

fn item_message(item: &Value) -> Option<String> {
    match item {
        Value::String(_) => non_empty_str(item),
        Value::Object(map) => ["msg", "message"]
            .iter()
            .find_map(|field| non_empty_str(map.get(*field)?)),
        _ => None,
    }
}

fn non_empty_str(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
