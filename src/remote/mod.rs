//! Remote store abstraction.
//!
//! The engines talk to the authoritative store only through [`RemoteApi`],
//! which sends one [`ApiRequest`] and returns the decoded JSON body. The HTTP
//! implementation lives in [`http`]; tests substitute an in-process fake.

use async_trait::async_trait;
use serde_json::Value;

pub mod http;

pub use http::HttpRemote;

/// Errors surfaced by a remote call.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Authentication required")]
    Unauthenticated,
}

impl RemoteError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// `404 Not Found` or `410 Gone`: the server has nothing to converge to.
    pub fn is_gone(&self) -> bool {
        matches!(self.status(), Some(404 | 410))
    }

    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(status) => Self::Status {
                status: status.as_u16(),
                message: error.to_string(),
            },
            None if error.is_decode() => Self::InvalidResponse(error.to_string()),
            None => Self::Network(error.to_string()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

/// A single REST call against the remote store. `path` is relative to the
/// API base URL and always starts with `/`.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Patch,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: Method::Delete,
            path: path.into(),
            body: None,
        }
    }
}

/// Interface the push and pull engines use to reach the remote store.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Sends the request. An empty response body decodes to `Value::Null`.
    async fn send(&self, request: ApiRequest) -> Result<Value, RemoteError>;

    /// Fetches a JSON array, rejecting any other payload shape.
    async fn fetch_list(&self, path: &str) -> Result<Vec<Value>, RemoteError> {
        match self.send(ApiRequest::get(path)).await? {
            Value::Array(items) => Ok(items),
            other => Err(RemoteError::InvalidResponse(format!(
                "expected a JSON array from {path}, got {}",
                json_type(&other)
            ))),
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
