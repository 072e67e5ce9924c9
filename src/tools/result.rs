use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// The only shape allowed to leave the dispatcher.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub meta: Map<String, Value>,
}

impl ToolResult {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }

    /// Error-shaped result used by transports; `data` and `meta` are still present.
    pub fn error(tool: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(message.clone())
            .with_field("error", json!(message))
            .with_meta("tool", json!(tool))
            .with_meta("status", json!("error"))
    }

    pub fn is_cached(&self) -> bool {
        self.meta.get("cached").and_then(Value::as_bool).unwrap_or(false)
    }
}

/// What a tool hands back before normalization.
#[derive(Clone, Debug)]
pub enum ToolOutput {
    Normalized(ToolResult),
    Text(String),
    Raw(Value),
}

impl From<ToolResult> for ToolOutput {
    fn from(result: ToolResult) -> Self {
        ToolOutput::Normalized(result)
    }
}

impl From<String> for ToolOutput {
    fn from(text: String) -> Self {
        ToolOutput::Text(text)
    }
}

impl From<&str> for ToolOutput {
    fn from(text: &str) -> Self {
        ToolOutput::Text(text.to_string())
    }
}

impl From<Value> for ToolOutput {
    fn from(value: Value) -> Self {
        ToolOutput::Raw(value)
    }
}

/// Coerces any tool output into a [`ToolResult`]. Never fails.
///
/// A raw object that already looks like `{text, data, meta}` is taken as is
/// (missing parts defaulted); any other value is wrapped under `data.result`.
pub fn normalize(tool: &str, output: ToolOutput) -> ToolResult {
    let mut result = match output {
        ToolOutput::Normalized(result) => result,
        ToolOutput::Text(text) => ToolResult::new(text.clone()).with_field("result", json!(text)),
        ToolOutput::Raw(value) => from_raw(value),
    };
    result
        .meta
        .entry("tool")
        .or_insert_with(|| Value::String(tool.to_string()));
    result
}

fn from_raw(value: Value) -> ToolResult {
    match value {
        Value::Object(mut map) if looks_normalized(&map) => {
            let text = match map.remove("text") {
                Some(Value::String(s)) => s,
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            };
            let data = match map.remove("data") {
                Some(Value::Object(data)) => data,
                Some(Value::Null) | None => Map::new(),
                Some(other) => wrap(other),
            };
            let meta = match map.remove("meta") {
                Some(Value::Object(meta)) => meta,
                _ => Map::new(),
            };
            ToolResult { text, data, meta }
        }
        Value::String(text) => ToolResult::new(text.clone()).with_field("result", Value::String(text)),
        Value::Null => ToolResult::default(),
        other => ToolResult {
            text: display(&other),
            data: wrap(other),
            meta: Map::new(),
        },
    }
}

fn looks_normalized(map: &Map<String, Value>) -> bool {
    (map.contains_key("data") || map.contains_key("text"))
        && map.keys().all(|k| matches!(k.as_str(), "text" | "data" | "meta"))
}

fn wrap(value: Value) -> Map<String, Value> {
    let mut data = Map::new();
    data.insert("result".into(), value);
    data
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
