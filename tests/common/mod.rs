#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use osintmcp::auth::ClientIdentity;
use osintmcp::error::{OsintError, Result};
use osintmcp::http::{HttpClient, OutboundRequest, OutboundResponse};
use osintmcp::tools::{CachePolicy, Tool, ToolArgs, ToolDefinition, ToolOutput, ToolResult};
use parking_lot::Mutex;
use serde_json::{json, Value};

/// Replays canned responses by URL and records every request it sees.
#[derive(Default)]
pub struct RecordingHttpClient {
    routes: Mutex<HashMap<String, (u16, String, BTreeMap<String, String>)>>,
    requests: Mutex<Vec<OutboundRequest>>,
    refused: Mutex<HashSet<String>>,
}

impl RecordingHttpClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn route(&self, url: &str, status: u16, body: Value) {
        self.route_text(url, status, &body.to_string());
    }

    pub fn route_text(&self, url: &str, status: u16, body: &str) {
        self.route_with_headers(url, status, body, &[]);
    }

    /// Header names are stored lowercased, as the reqwest client does.
    pub fn route_with_headers(&self, url: &str, status: u16, body: &str, headers: &[(&str, &str)]) {
        let headers = headers
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.to_string()))
            .collect();
        self.routes
            .lock()
            .insert(url.to_string(), (status, body.to_string(), headers));
    }

    /// Requests to `url` fail at the transport level.
    pub fn refuse(&self, url: &str) {
        self.refused.lock().insert(url.to_string());
    }

    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.requests.lock().clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.requests.lock().iter().map(|r| r.url.clone()).collect()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl HttpClient for RecordingHttpClient {
    async fn send(&self, request: OutboundRequest) -> Result<OutboundResponse> {
        let url = request.url.clone();
        self.requests.lock().push(request);
        if self.refused.lock().contains(&url) {
            return Err(OsintError::execution_failed("connection to upstream failed"));
        }
        let route = self.routes.lock().get(&url).cloned();
        match route {
            Some((status, body, headers)) => Ok(OutboundResponse {
                status,
                headers,
                body,
            }),
            None => Ok(OutboundResponse {
                status: 404,
                headers: BTreeMap::new(),
                body: "not found".into(),
            }),
        }
    }

    fn user_agent(&self) -> &str {
        "osintmcp-tests"
    }
}

/// Counts executions; cacheable with a 60 s TTL and keyed per domain.
pub struct CountingTool {
    pub name: &'static str,
    pub calls: Arc<AtomicUsize>,
    pub cacheable: bool,
}

impl CountingTool {
    pub fn new(name: &'static str) -> (Arc<Self>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let tool = Arc::new(Self {
            name,
            calls: Arc::clone(&calls),
            cacheable: true,
        });
        (tool, calls)
    }

    pub fn uncached(name: &'static str) -> (Arc<Self>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let tool = Arc::new(Self {
            name,
            calls: Arc::clone(&calls),
            cacheable: false,
        });
        (tool, calls)
    }
}

#[async_trait]
impl Tool for CountingTool {
    fn name(&self) -> &str {
        self.name
    }

    fn definition(&self) -> ToolDefinition {
        let builder = ToolDefinition::builder(self.name).param("domain", json!({"type": "string"}), false);
        if self.cacheable {
            builder.cache_ttl(60).build()
        } else {
            builder.no_cache().build()
        }
    }

    async fn execute(&self, args: &ToolArgs, _client: &ClientIdentity) -> Result<ToolOutput> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let domain = args.get("domain").cloned().unwrap_or(Value::Null);
        Ok(ToolResult::new(format!("call {n}"))
            .with_field("domain", domain)
            .with_field("call", json!(n))
            .into())
    }
}

/// Fails with whatever error the constructor closure builds.
pub struct FailingTool {
    pub name: &'static str,
    pub make_error: fn() -> OsintError,
}

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        self.name
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::builder(self.name).build()
    }

    async fn execute(&self, _args: &ToolArgs, _client: &ClientIdentity) -> Result<ToolOutput> {
        Err((self.make_error)())
    }
}

/// Sleeps before answering.
pub struct SlowTool {
    pub delay: Duration,
}

#[async_trait]
impl Tool for SlowTool {
    fn name(&self) -> &str {
        "slow"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::builder("slow").cache(CachePolicy::Search).build()
    }

    async fn execute(&self, _args: &ToolArgs, _client: &ClientIdentity) -> Result<ToolOutput> {
        tokio::time::sleep(self.delay).await;
        Ok("done".into())
    }
}

pub fn args(value: Value) -> ToolArgs {
    value.as_object().cloned().unwrap_or_default()
}
