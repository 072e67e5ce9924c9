use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// TTL classes shared by every tool. Host-style lookups change slowly;
/// search results go stale quickly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicy {
    Host,
    Search,
    Spec,
}

impl CachePolicy {
    pub const HOST_TTL_SECS: u64 = 3600;
    pub const SEARCH_TTL_SECS: u64 = 900;
    pub const SPEC_TTL_SECS: u64 = 3600;

    pub fn ttl_secs(&self) -> u64 {
        match self {
            CachePolicy::Host => Self::HOST_TTL_SECS,
            CachePolicy::Search => Self::SEARCH_TTL_SECS,
            CachePolicy::Spec => Self::SPEC_TTL_SECS,
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "empty_object_schema")]
    pub input_schema: Value,
    #[serde(default)]
    pub streamable: bool,
    #[serde(default)]
    pub cacheable: bool,
    /// Seconds; `None` on a cacheable tool means "no expiry".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_ttl: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

fn empty_object_schema() -> Value {
    json!({ "type": "object", "properties": {} })
}

impl ToolDefinition {
    pub fn builder(name: impl Into<String>) -> ToolDefinitionBuilder {
        ToolDefinitionBuilder::new(name)
    }

    pub fn ttl(&self) -> Option<Duration> {
        if !self.cacheable {
            return None;
        }
        self.cache_ttl.map(Duration::from_secs)
    }

    /// Names listed under the schema's `required` array.
    pub fn required_params(&self) -> Vec<&str> {
        self.input_schema
            .get("required")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

#[derive(Clone, Debug)]
pub struct ToolDefinitionBuilder {
    definition: ToolDefinition,
    properties: Map<String, Value>,
    required: Vec<String>,
}

impl ToolDefinitionBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            definition: ToolDefinition {
                name: name.into(),
                description: String::new(),
                input_schema: empty_object_schema(),
                streamable: false,
                cacheable: false,
                cache_ttl: None,
                required_scope: None,
                category: None,
                metadata: Map::new(),
            },
            properties: Map::new(),
            required: Vec::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.definition.description = description.into();
        self
    }

    /// Adds one property to the object schema.
    pub fn param(mut self, name: impl Into<String>, schema: Value, required: bool) -> Self {
        let name = name.into();
        if required && !self.required.contains(&name) {
            self.required.push(name.clone());
        }
        self.properties.insert(name, schema);
        self
    }

    /// Replaces the whole schema; properties added via `param` are discarded.
    pub fn input_schema(mut self, schema: Value) -> Self {
        self.definition.input_schema = schema;
        self.properties.clear();
        self.required.clear();
        self
    }

    pub fn streamable(mut self, streamable: bool) -> Self {
        self.definition.streamable = streamable;
        self
    }

    pub fn cache(mut self, policy: CachePolicy) -> Self {
        self.definition.cacheable = true;
        self.definition.cache_ttl = Some(policy.ttl_secs());
        self
    }

    pub fn cache_ttl(mut self, secs: u64) -> Self {
        self.definition.cacheable = true;
        self.definition.cache_ttl = Some(secs);
        self
    }

    pub fn no_cache(mut self) -> Self {
        self.definition.cacheable = false;
        self.definition.cache_ttl = None;
        self
    }

    pub fn required_scope(mut self, scope: impl Into<String>) -> Self {
        self.definition.required_scope = Some(scope.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.definition.category = Some(category.into());
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.definition.metadata.insert(key.into(), value);
        self
    }

    pub fn build(self) -> ToolDefinition {
        let mut definition = self.definition;
        if !self.properties.is_empty() {
            let mut schema = Map::new();
            schema.insert("type".into(), json!("object"));
            schema.insert("properties".into(), Value::Object(self.properties));
            if !self.required.is_empty() {
                schema.insert("required".into(), json!(self.required));
            }
            definition.input_schema = Value::Object(schema);
        }
        definition
    }
}
