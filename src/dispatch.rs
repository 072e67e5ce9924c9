//! Central invoke path shared by every transport.
//!
//! validate → resolve → authorize → cache lookup → rate limit → execute
//! (bounded) → normalize → cache write → envelope.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

use crate::auth::ClientIdentity;
use crate::cache::Cache;
use crate::error::{OsintError, Result};
use crate::rate_limit::RateLimiter;
use crate::tools::{normalize, Tool, ToolArgs, ToolRegistry, ToolResult};

pub const DEFAULT_EXECUTION_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvokeStatus {
    Success,
    Error,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvokeError {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl From<&OsintError> for InvokeError {
    fn from(err: &OsintError) -> Self {
        Self {
            code: err.kind().code().to_string(),
            message: err.client_message(),
            details: err.details(),
        }
    }
}

/// Status envelope rendered identically by every transport. Error responses
/// still carry a `result` with `text`, `data.error` and `meta.status`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvokeResponse {
    pub status: InvokeStatus,
    pub tool: String,
    pub result: ToolResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<InvokeError>,
}

impl InvokeResponse {
    pub fn success(tool: impl Into<String>, result: ToolResult) -> Self {
        Self {
            status: InvokeStatus::Success,
            tool: tool.into(),
            result,
            error: None,
        }
    }

    pub fn failure(tool: impl Into<String>, err: &OsintError) -> Self {
        let tool = tool.into();
        let error = InvokeError::from(err);
        let mut result = ToolResult::error(&tool, error.message.clone());
        result
            .data
            .insert("code".into(), Value::String(error.code.clone()));
        Self {
            status: InvokeStatus::Error,
            tool,
            result,
            error: Some(error),
        }
    }

    pub fn from_result(tool: &str, outcome: Result<ToolResult>) -> Self {
        match outcome {
            Ok(result) => Self::success(tool, result),
            Err(err) => Self::failure(tool, &err),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == InvokeStatus::Success
    }

    pub fn error_code(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.code.as_str())
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    cache: Cache,
    limiter: Arc<RateLimiter>,
    execution_timeout: Duration,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>, cache: Cache, limiter: Arc<RateLimiter>) -> Self {
        Self {
            registry,
            cache,
            limiter,
            execution_timeout: DEFAULT_EXECUTION_TIMEOUT,
        }
    }

    pub fn with_execution_timeout(mut self, execution_timeout: Duration) -> Self {
        self.execution_timeout = execution_timeout;
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Runs one invocation and wraps the outcome in the status envelope.
    pub async fn respond(&self, tool: &str, params: Value, client: &ClientIdentity) -> InvokeResponse {
        let outcome = self.invoke(tool, params, client).await;
        InvokeResponse::from_result(tool.trim(), outcome)
    }

    #[instrument(skip(self, params, client), fields(client = %client.client_id))]
    pub async fn invoke(&self, tool: &str, params: Value, client: &ClientIdentity) -> Result<ToolResult> {
        // 1. validate
        let name = tool.trim();
        if name.is_empty() {
            return Err(OsintError::invalid_input("tool name must be a non-empty string"));
        }
        let args = match params {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            _ => return Err(OsintError::invalid_input("params must be a JSON object")),
        };

        // 2. resolve
        let tool = self.registry.get(name).ok_or_else(|| {
            OsintError::invalid_input(format!(
                "unknown tool `{name}`; available tools: [{}]",
                self.registry.list().join(", ")
            ))
        })?;
        let definition = tool.definition();

        // 3. authorize, before the schema is revealed through missing-param errors
        if let Some(scope) = definition.required_scope.as_deref() {
            if !client.has_scope(scope) {
                warn!(tool = name, scope, "client lacks required scope");
                return Err(OsintError::forbidden(format!("missing scope `{scope}`")));
            }
        }
        check_required(&definition.required_params(), &args)?;

        // 4. cache lookup
        let cache_key = tool.is_cacheable(&args).then(|| tool.cache_key(&args));
        if let Some(key) = cache_key.as_deref() {
            if let Some(hit) = self.cached(name, key).await {
                return Ok(hit);
            }
        }

        // 5. rate limit (cache hits never get here)
        let rate_key = tool.rate_limit_key(&args);
        self.limiter.acquire(&rate_key)?;

        // 6. execute
        info!(tool = name, "executing tool");
        let started = Instant::now();
        let output = self.execute(name, tool.as_ref(), &args, client).await?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        // 7. normalize + write-through
        let mut result = normalize(name, output);
        result.meta.insert("cached".into(), json!(false));
        if let Some(key) = cache_key {
            self.store(name, key, &result, tool.cache_ttl(&args)).await;
        }
        result.meta.insert("elapsed_ms".into(), json!(elapsed_ms));
        debug!(tool = name, elapsed_ms, "tool finished");
        Ok(result)
    }

    async fn cached(&self, name: &str, key: &str) -> Option<ToolResult> {
        let value = self.cache.get(key).await?;
        match serde_json::from_value::<ToolResult>(value) {
            Ok(mut result) => {
                debug!(tool = name, cache_key = key, "cache hit");
                result.meta.insert("cached".into(), json!(true));
                result
                    .meta
                    .entry("tool")
                    .or_insert_with(|| Value::String(name.to_string()));
                Some(result)
            }
            Err(err) => {
                warn!(tool = name, cache_key = key, error = %err, "cached entry is not a tool result, discarding");
                self.cache.delete(key).await;
                None
            }
        }
    }

    async fn execute(
        &self,
        name: &str,
        tool: &dyn Tool,
        args: &ToolArgs,
        client: &ClientIdentity,
    ) -> Result<crate::tools::ToolOutput> {
        match timeout(self.execution_timeout, tool.execute(args, client)).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(err)) => Err(contain(name, err)),
            Err(_) => {
                warn!(tool = name, timeout_secs = self.execution_timeout.as_secs(), "tool execution timed out");
                Err(OsintError::execution_failed("tool execution timed out"))
            }
        }
    }

    /// The write runs on its own task so a cancelled caller can't abort it halfway.
    async fn store(&self, name: &str, key: String, result: &ToolResult, ttl: Option<Duration>) {
        let cache = self.cache.clone();
        let value = result.clone();
        let handle = tokio::spawn(async move { cache.set(&key, &value, ttl).await });
        match handle.await {
            Ok(true) => debug!(tool = name, "result cached"),
            Ok(false) => debug!(tool = name, "result not cached"),
            Err(err) => warn!(tool = name, error = %err, "cache write task failed"),
        }
    }
}

fn check_required(required: &[&str], args: &ToolArgs) -> Result<()> {
    for param in required {
        if matches!(args.get(*param), None | Some(Value::Null)) {
            return Err(OsintError::invalid_input(format!("missing required parameter `{param}`")));
        }
    }
    Ok(())
}

/// Expected conditions pass through; anything else becomes `ExecutionFailed`
/// with only a short summary. Full detail goes to the log.
fn contain(name: &str, err: OsintError) -> OsintError {
    if err.is_passthrough() {
        debug!(tool = name, error = %err, "tool returned expected error");
        return err;
    }
    error!(tool = name, error = ?err, "tool failed with internal error");
    OsintError::execution_failed(err.client_message())
}
