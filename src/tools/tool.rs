use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::auth::ClientIdentity;
use crate::cache::build_cache_key;
use crate::error::{OsintError, Result};
use crate::tools::definition::ToolDefinition;
use crate::tools::result::ToolOutput;

pub type ToolArgs = Map<String, Value>;

/// A named, schema-described unit of OSINT work.
///
/// Implementations own their outbound calls. Caching, rate limiting and
/// normalization happen in the dispatcher, driven by the hooks below.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn definition(&self) -> ToolDefinition;

    async fn execute(&self, args: &ToolArgs, client: &ClientIdentity) -> Result<ToolOutput>;

    fn cache_key(&self, args: &ToolArgs) -> String {
        build_cache_key(self.name(), &Value::Object(args.clone()))
    }

    /// `None` disables caching for this particular call.
    fn cache_ttl(&self, _args: &ToolArgs) -> Option<Duration> {
        self.definition().ttl()
    }

    fn is_cacheable(&self, _args: &ToolArgs) -> bool {
        self.definition().cacheable
    }

    /// Rate-limit bucket for a call. Tools narrow this to the target
    /// (domain, ip, upstream host) so independent targets don't starve each other.
    fn rate_limit_key(&self, _args: &ToolArgs) -> String {
        self.name().to_string()
    }

    /// True for tools synthesized from a remote API document. Those may
    /// replace each other but never a native tool.
    fn is_discovered(&self) -> bool {
        false
    }
}

pub fn required_str<'a>(args: &'a ToolArgs, key: &str) -> Result<&'a str> {
    match args.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim()),
        Some(Value::String(_)) | None | Some(Value::Null) => {
            Err(OsintError::invalid_input(format!("`{key}` is required")))
        }
        Some(_) => Err(OsintError::invalid_input(format!("`{key}` must be a string"))),
    }
}

pub fn optional_str<'a>(args: &'a ToolArgs, key: &str) -> Result<Option<&'a str>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim())),
        Some(_) => Err(OsintError::invalid_input(format!("`{key}` must be a string"))),
    }
}

pub fn optional_bool(args: &ToolArgs, key: &str, default: bool) -> Result<bool> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(OsintError::invalid_input(format!("`{key}` must be a boolean"))),
    }
}

pub fn optional_u64(args: &ToolArgs, key: &str) -> Result<Option<u64>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .map(Some)
            .ok_or_else(|| OsintError::invalid_input(format!("`{key}` must be a non-negative integer"))),
    }
}

pub fn optional_object<'a>(args: &'a ToolArgs, key: &str) -> Result<Option<&'a ToolArgs>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(OsintError::invalid_input(format!("`{key}` must be an object"))),
    }
}
