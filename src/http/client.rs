use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use tracing::{debug, instrument};

use super::{HttpClient, HttpMethod, OutboundRequest, OutboundResponse};
use crate::error::{OsintError, Result};

/// `reqwest`-backed collaborator. Each request carries its own timeout on top
/// of the client-wide connect timeout.
#[derive(Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
    user_agent: String,
}

impl ReqwestHttpClient {
    /// Pooled client with a 10 s connect timeout.
    pub fn new(user_agent: impl Into<String>) -> Result<Self> {
        let user_agent = user_agent.into();
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent.clone())
            .build()
            .map_err(|e| OsintError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, user_agent })
    }

    fn method(method: HttpMethod) -> Method {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
            HttpMethod::Head => Method::HEAD,
        }
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    // headers and query may carry credentials, keep them out of the span
    #[instrument(skip_all, fields(method = request.method.as_str()))]
    async fn send(&self, request: OutboundRequest) -> Result<OutboundResponse> {
        let mut builder = self
            .client
            .request(Self::method(request.method), &request.url)
            .timeout(request.timeout);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if let Some(body) = &request.json_body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(map_transport_error)?;
        let status = response.status().as_u16();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|v| (k.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.text().await.map_err(map_transport_error)?;
        debug!(status, bytes = body.len(), "outbound request completed");

        Ok(OutboundResponse {
            status,
            headers,
            body,
        })
    }

    fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

fn map_transport_error(err: reqwest::Error) -> OsintError {
    if err.is_timeout() {
        OsintError::execution_failed("upstream request timed out")
    } else if err.is_connect() {
        OsintError::execution_failed("connection to upstream failed")
    } else if err.is_decode() || err.is_body() {
        OsintError::execution_failed("failed to read upstream response")
    } else {
        OsintError::execution_failed("upstream request failed")
    }
}
