use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{host_of, synthesize_gradio, ConnectorManager};
use crate::auth::{ClientIdentity, DEFAULT_SCOPE};
use crate::error::{OsintError, Result};
use crate::tools::{
    required_str, CachePolicy, Tool, ToolArgs, ToolDefinition, ToolOutput, ToolResult,
};

/// `gradio`: list the functions of an allowlisted Gradio app or run one.
pub struct GradioConnectorTool {
    manager: Arc<ConnectorManager>,
}

impl GradioConnectorTool {
    pub fn new(manager: Arc<ConnectorManager>) -> Self {
        Self { manager }
    }

    async fn discover(&self, base_url: &str) -> Result<ToolResult> {
        let info = self
            .manager
            .fetch_gradio_spec(base_url)
            .await?
            .ok_or_else(|| OsintError::invalid_input(format!("could not discover a Gradio app at {base_url}")))?;
        let tools = synthesize_gradio(base_url, &info);
        Ok(ToolResult::new(format!(
            "Discovered {} Gradio function(s) at {base_url}",
            tools.len()
        ))
        .with_field("base_url", json!(base_url))
        .with_field("tools", json!(tools)))
    }

    async fn invoke(&self, base_url: &str, args: &ToolArgs) -> Result<ToolResult> {
        let function = required_str(args, "function_name")?;
        let arguments = args.get("arguments").cloned().unwrap_or_else(|| json!({}));
        let result = self.manager.gradio_invoke(base_url, function, &arguments).await?;
        Ok(ToolResult::new(format!("Invoked Gradio function: {function}"))
            .with_field("function", json!(function))
            .with_field("result", result)
            .with_meta("base_url", json!(base_url)))
    }
}

#[async_trait]
impl Tool for GradioConnectorTool {
    fn name(&self) -> &str {
        "gradio"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::builder(self.name())
            .description("Proxy connector for Gradio applications. Discovers app functions and invokes them.")
            .param("action", json!({"type": "string", "enum": ["discover", "invoke"]}), true)
            .param("base_url", json!({"type": "string", "description": "Gradio app base URL"}), true)
            .param("function_name", json!({"type": "string"}), false)
            .param("arguments", json!({"type": "object"}), false)
            .cache(CachePolicy::Spec)
            .required_scope(DEFAULT_SCOPE)
            .category("connector")
            .build()
    }

    async fn execute(&self, args: &ToolArgs, _client: &ClientIdentity) -> Result<ToolOutput> {
        let base_url = required_str(args, "base_url")?;
        match required_str(args, "action")? {
            "discover" => Ok(self.discover(base_url).await?.into()),
            "invoke" => Ok(self.invoke(base_url, args).await?.into()),
            other => Err(OsintError::invalid_input(format!("unknown action `{other}`"))),
        }
    }

    fn is_cacheable(&self, args: &ToolArgs) -> bool {
        args.get("action").and_then(Value::as_str) == Some("discover")
    }

    fn cache_ttl(&self, _args: &ToolArgs) -> Option<Duration> {
        Some(CachePolicy::Spec.ttl())
    }

    fn rate_limit_key(&self, args: &ToolArgs) -> String {
        let base_url = args.get("base_url").and_then(Value::as_str).unwrap_or_default();
        format!("connector:{}", host_of(base_url))
    }
}
