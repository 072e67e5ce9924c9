use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{host_of, ConnectorManager, ProxyAuth};
use crate::auth::{ClientIdentity, DEFAULT_SCOPE};
use crate::error::{OsintError, Result};
use crate::tools::{
    optional_bool, optional_object, optional_str, required_str, CachePolicy, Tool, ToolArgs,
    ToolDefinition, ToolOutput, ToolRegistry, ToolResult,
};

/// `openapi_connector`: discover an allowlisted API or proxy one call to it.
pub struct OpenApiConnectorTool {
    manager: Arc<ConnectorManager>,
    // weak: the registry owns this tool
    registry: Weak<ToolRegistry>,
}

impl OpenApiConnectorTool {
    pub fn new(manager: Arc<ConnectorManager>, registry: &Arc<ToolRegistry>) -> Self {
        Self {
            manager,
            registry: Arc::downgrade(registry),
        }
    }

    async fn discover(&self, args: &ToolArgs) -> Result<ToolResult> {
        let base_url = required_str(args, "base_url")?;
        let spec = self
            .manager
            .fetch_spec(base_url)
            .await?
            .ok_or_else(|| OsintError::invalid_input(format!("no OpenAPI spec found at {base_url}")))?;
        let descriptors = self.manager.synthesize_tools(base_url, &spec);

        let registered = if optional_bool(args, "register", false)? {
            let registry = self
                .registry
                .upgrade()
                .ok_or_else(|| OsintError::unavailable("tool registry is shutting down"))?;
            self.manager.discover_and_register(base_url, &registry).await?
        } else {
            Vec::new()
        };

        Ok(ToolResult::new(format!(
            "Discovered {} operation(s) at {base_url}",
            descriptors.len()
        ))
        .with_field("base_url", json!(base_url))
        .with_field("count", json!(descriptors.len()))
        .with_field("tools", json!(descriptors))
        .with_field("registered", json!(registered)))
    }

    async fn invoke(&self, args: &ToolArgs) -> Result<ToolResult> {
        let base_url = required_str(args, "base_url")?;
        let path = required_str(args, "path")?;
        let method = optional_str(args, "method")?.unwrap_or("GET").to_ascii_uppercase();
        let params = optional_object(args, "params")?.cloned().unwrap_or_default();
        let auth: Option<ProxyAuth> = optional_object(args, "auth")?
            .map(|auth| serde_json::from_value(Value::Object(auth.clone())))
            .transpose()
            .map_err(|_| OsintError::invalid_input("`auth` must be {headers?: {..}, query?: {..}} with string values"))?;

        let response = self
            .manager
            .proxy_invoke(base_url, path, &method, &params, auth.as_ref())
            .await?;
        Ok(ToolResult::new(format!("{method} {path} completed"))
            .with_field("response", response)
            .with_meta("base_url", json!(base_url))
            .with_meta("path", json!(path))
            .with_meta("method", json!(method)))
    }
}

#[async_trait]
impl Tool for OpenApiConnectorTool {
    fn name(&self) -> &str {
        "openapi_connector"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::builder(self.name())
            .description("Discover an allowlisted OpenAPI service and proxy calls to its operations.")
            .param("action", json!({"type": "string", "enum": ["discover", "invoke"]}), true)
            .param("base_url", json!({"type": "string", "format": "uri"}), true)
            .param("path", json!({"type": "string", "description": "Operation path, e.g. /v1/items"}), false)
            .param("method", json!({"type": "string", "default": "GET"}), false)
            .param("params", json!({"type": "object"}), false)
            .param("auth", json!({"type": "object", "description": "headers/query forwarded upstream"}), false)
            .param("register", json!({"type": "boolean", "default": false}), false)
            .cache(CachePolicy::Spec)
            .required_scope(DEFAULT_SCOPE)
            .category("connector")
            .build()
    }

    async fn execute(&self, args: &ToolArgs, _client: &ClientIdentity) -> Result<ToolOutput> {
        match required_str(args, "action")? {
            "discover" => Ok(self.discover(args).await?.into()),
            "invoke" => Ok(self.invoke(args).await?.into()),
            other => Err(OsintError::invalid_input(format!(
                "unknown action `{other}`, expected `discover` or `invoke`"
            ))),
        }
    }

    // proxied calls may carry credentials and have side effects
    fn is_cacheable(&self, args: &ToolArgs) -> bool {
        args.get("action").and_then(Value::as_str) == Some("discover")
            && !args.get("register").and_then(Value::as_bool).unwrap_or(false)
    }

    fn cache_ttl(&self, _args: &ToolArgs) -> Option<Duration> {
        Some(CachePolicy::Spec.ttl())
    }

    fn rate_limit_key(&self, args: &ToolArgs) -> String {
        let base_url = args.get("base_url").and_then(Value::as_str).unwrap_or_default();
        format!("connector:{}", host_of(base_url))
    }
}
