use serde::Serialize;
use serde_json::Value;

use crate::error::{OsintError, Result};
use crate::server::OsintServer;
use crate::tools::ToolDefinition;

#[derive(Clone, Debug, Serialize)]
pub struct ToolCatalog {
    pub count: usize,
    pub tools: Vec<ToolDefinition>,
}

pub fn tool_catalog(server: &OsintServer) -> ToolCatalog {
    let tools = server.list_definitions();
    ToolCatalog {
        count: tools.len(),
        tools,
    }
}

/// `--params` must be a JSON object; absent means `{}`.
pub fn parse_params(raw: Option<&str>) -> Result<Value> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(Value::Object(Default::default()));
    };
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| OsintError::invalid_input(format!("--params is not valid JSON: {e}")))?;
    if !value.is_object() {
        return Err(OsintError::invalid_input("--params must be a JSON object"));
    }
    Ok(value)
}

pub fn render_json<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(rendered)
}
