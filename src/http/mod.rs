mod client;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

pub use client::ReqwestHttpClient;

use crate::error::{OsintError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    /// Native tools only; connectors never proxy HEAD.
    Head,
}

impl HttpMethod {
    /// Methods accepted for proxied connector calls.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "GET" => Some(HttpMethod::Get),
            "POST" => Some(HttpMethod::Post),
            "PUT" => Some(HttpMethod::Put),
            "PATCH" => Some(HttpMethod::Patch),
            "DELETE" => Some(HttpMethod::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
        }
    }
}

#[derive(Clone, Debug)]
pub struct OutboundRequest {
    pub method: HttpMethod,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: BTreeMap<String, String>,
    pub json_body: Option<Value>,
    pub timeout: Duration,
}

impl OutboundRequest {
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self::new(HttpMethod::Get, url, timeout)
    }

    pub fn head(url: impl Into<String>, timeout: Duration) -> Self {
        Self::new(HttpMethod::Head, url, timeout)
    }

    pub fn new(method: HttpMethod, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: BTreeMap::new(),
            json_body: None,
            timeout,
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.json_body = Some(body);
        self
    }
}

#[derive(Clone, Debug)]
pub struct OutboundResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl OutboundResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> Result<Value> {
        serde_json::from_str(&self.body)
            .map_err(|_| OsintError::execution_failed("upstream returned malformed JSON"))
    }

    /// Parsed JSON body, or `{"text": body}` when the body is not JSON.
    pub fn json_or_text(&self) -> Value {
        serde_json::from_str(&self.body)
            .unwrap_or_else(|_| serde_json::json!({ "text": self.body }))
    }

    pub fn retry_after(&self) -> Option<Duration> {
        self.headers
            .get("retry-after")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }

    /// Converts a non-2xx response into the shared error taxonomy.
    pub fn error_for_status(self, source: &str) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        Err(classify_status(self.status, self.retry_after(), source))
    }
}

pub fn classify_status(status: u16, retry_after: Option<Duration>, source: &str) -> OsintError {
    match status {
        401 | 403 => OsintError::forbidden(format!("{source} rejected the request ({status})")),
        429 => OsintError::RateLimitExceeded {
            key: source.to_string(),
            retry_after: retry_after.unwrap_or(Duration::from_secs(60)),
        },
        400..=499 => OsintError::invalid_input(format!("{source} rejected the request ({status})")),
        _ => OsintError::execution_failed(format!("{source} returned HTTP {status}")),
    }
}

/// Outbound request/response collaborator used by every native tool and connector.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(&self, request: OutboundRequest) -> Result<OutboundResponse>;

    fn user_agent(&self) -> &str;
}

pub type DynHttpClient = Arc<dyn HttpClient>;
