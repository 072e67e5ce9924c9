use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::{host_of, ConnectorManager, OperationDescriptor};
use crate::auth::{ClientIdentity, DEFAULT_SCOPE};
use crate::error::{OsintError, Result};
use crate::http::HttpMethod;
use crate::tools::{CachePolicy, Tool, ToolArgs, ToolDefinition, ToolOutput, ToolResult};

/// A tool synthesized from one discovered operation.
pub struct ProxiedTool {
    manager: Arc<ConnectorManager>,
    descriptor: OperationDescriptor,
}

impl ProxiedTool {
    pub fn new(manager: Arc<ConnectorManager>, descriptor: OperationDescriptor) -> Self {
        Self {
            manager,
            descriptor,
        }
    }

    pub fn descriptor(&self) -> &OperationDescriptor {
        &self.descriptor
    }

    /// Fills `{name}` placeholders and returns the remaining arguments.
    fn resolve_path(&self, args: &ToolArgs) -> Result<(String, Map<String, Value>)> {
        let mut path = self.descriptor.path.clone();
        let mut rest = args.clone();
        for name in &self.descriptor.path_params {
            let value = rest
                .remove(name)
                .ok_or_else(|| OsintError::invalid_input(format!("missing path parameter `{name}`")))?;
            let value = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                _ => return Err(OsintError::invalid_input(format!("path parameter `{name}` must be a scalar"))),
            };
            if value.is_empty() || value.contains('/') || value.contains("..") {
                return Err(OsintError::invalid_input(format!("invalid value for path parameter `{name}`")));
            }
            path = path.replace(&format!("{{{name}}}"), &value);
        }
        Ok((path, rest))
    }
}

#[async_trait]
impl Tool for ProxiedTool {
    fn name(&self) -> &str {
        &self.descriptor.name
    }

    fn definition(&self) -> ToolDefinition {
        let d = &self.descriptor;
        let builder = ToolDefinition::builder(&d.name)
            .description(&d.description)
            .input_schema(d.input_schema.clone())
            .required_scope(DEFAULT_SCOPE)
            .category(&d.category)
            .metadata("base_url", json!(d.base_url))
            .metadata("path", json!(d.path))
            .metadata("method", json!(d.method))
            .metadata("requires_auth", json!(d.requires_auth));
        if d.http_method() == HttpMethod::Get {
            builder.cache(CachePolicy::Search).build()
        } else {
            builder.no_cache().build()
        }
    }

    async fn execute(&self, args: &ToolArgs, _client: &ClientIdentity) -> Result<ToolOutput> {
        // the allowlist may have changed since discovery
        if !self.manager.is_allowed(&self.descriptor.base_url) {
            return Err(OsintError::forbidden(format!(
                "{} is no longer allowlisted",
                self.descriptor.base_url
            )));
        }
        let (path, params) = self.resolve_path(args)?;
        let response = self
            .manager
            .proxy_invoke(&self.descriptor.base_url, &path, &self.descriptor.method, &params, None)
            .await?;

        Ok(ToolResult::new(format!("{} {} completed", self.descriptor.method, path))
            .with_field("response", response)
            .with_meta("base_url", json!(self.descriptor.base_url))
            .with_meta("path", json!(path))
            .with_meta("method", json!(self.descriptor.method))
            .into())
    }

    fn rate_limit_key(&self, _args: &ToolArgs) -> String {
        format!("connector:{}", host_of(&self.descriptor.base_url))
    }

    fn is_discovered(&self) -> bool {
        true
    }
}
