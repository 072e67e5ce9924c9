use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use crate::auth::{ClientIdentity, DEFAULT_SCOPE};
use crate::error::{OsintError, Result};
use crate::http::{DynHttpClient, OutboundRequest};
use crate::tools::definition::{CachePolicy, ToolDefinition};
use crate::tools::result::{ToolOutput, ToolResult};
use crate::tools::tool::{optional_str, optional_u64, Tool, ToolArgs};
use crate::utils::TargetValidator;

const SHODAN_API: &str = "https://api.shodan.io";
const SUMMARY_MATCHES: usize = 5;
const SUMMARY_PORTS: usize = 10;

/// Shodan search (`query`) or host lookup (`ip`).
pub struct ShodanTool {
    http: DynHttpClient,
    api_key: Option<String>,
    base_url: String,
    timeout: Duration,
    validator: Arc<TargetValidator>,
}

impl ShodanTool {
    pub fn new(
        http: DynHttpClient,
        api_key: Option<String>,
        timeout: Duration,
        validator: Arc<TargetValidator>,
    ) -> Self {
        Self {
            http,
            api_key,
            base_url: SHODAN_API.to_string(),
            timeout,
            validator,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| OsintError::unavailable("SHODAN_API_KEY is not configured"))
    }

    async fn search(&self, query: &str, facets: Option<&str>, page: u64) -> Result<ToolResult> {
        let mut request = OutboundRequest::get(format!("{}/shodan/host/search", self.base_url), self.timeout)
            .query("key", self.api_key()?)
            .query("query", query)
            .query("page", page.to_string());
        if let Some(facets) = facets {
            request = request.query("facets", facets);
        }
        info!(page, "shodan search");
        let body = self.http.send(request).await?.error_for_status("shodan")?.json()?;

        let total = body.get("total").and_then(Value::as_u64).unwrap_or(0);
        let matches = body.get("matches").cloned().unwrap_or_else(|| json!([]));
        let listed = matches.as_array().map(Vec::as_slice).unwrap_or_default();

        let mut text = format!("Found {total} results for query: {query}\n");
        for (idx, item) in listed.iter().take(SUMMARY_MATCHES).enumerate() {
            text.push_str(&format!(
                "{}. {}:{} ({})\n",
                idx + 1,
                field(item, "ip_str"),
                field(item, "port"),
                field(item, "org"),
            ));
        }
        if listed.len() > SUMMARY_MATCHES {
            text.push_str(&format!("... and {} more results", listed.len() - SUMMARY_MATCHES));
        }

        Ok(ToolResult::new(text)
            .with_field("total", json!(total))
            .with_field("matches", matches)
            .with_field("facets", body.get("facets").cloned().unwrap_or_else(|| json!({})))
            .with_meta("query", json!(query))
            .with_meta("page", json!(page))
            .with_meta("source", json!("shodan")))
    }

    async fn host(&self, ip: &str) -> Result<ToolResult> {
        let ip = self.validator.validate_public_ip(ip)?.to_string();
        let request = OutboundRequest::get(format!("{}/shodan/host/{ip}", self.base_url), self.timeout)
            .query("key", self.api_key()?);
        info!(ip = %ip, "shodan host lookup");
        let body = self.http.send(request).await?.error_for_status("shodan")?.json()?;

        let ports: Vec<String> = body
            .get("ports")
            .and_then(Value::as_array)
            .map(|ports| ports.iter().map(|p| p.to_string()).collect())
            .unwrap_or_default();
        let mut text = format!(
            "Host: {ip}\nOrganization: {}\nCountry: {}\nOpen Ports: {}\n",
            field(&body, "org"),
            field(&body, "country_name"),
            ports.iter().take(SUMMARY_PORTS).cloned().collect::<Vec<_>>().join(", "),
        );
        if ports.len() > SUMMARY_PORTS {
            text.push_str(&format!("... and {} more ports", ports.len() - SUMMARY_PORTS));
        }

        let data = match body {
            Value::Object(map) => map,
            other => {
                let mut map = serde_json::Map::new();
                map.insert("result".into(), other);
                map
            }
        };
        Ok(ToolResult::new(text)
            .with_data(data)
            .with_meta("ip", json!(ip))
            .with_meta("source", json!("shodan")))
    }
}

fn field(value: &Value, key: &str) -> String {
    match value.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "N/A".to_string(),
        Some(other) => other.to_string(),
    }
}

#[async_trait]
impl Tool for ShodanTool {
    fn name(&self) -> &str {
        "shodan_search"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::builder(self.name())
            .description(
                "Search Shodan for devices, services and vulnerabilities, or look up a single host by `ip`.",
            )
            .param("query", json!({"type": "string", "description": "Shodan query syntax, e.g. `port:22`"}), false)
            .param("facets", json!({"type": "string", "description": "Comma-separated facets, e.g. `country,org`"}), false)
            .param("page", json!({"type": "integer", "default": 1, "minimum": 1}), false)
            .param("ip", json!({"type": "string", "description": "Host lookup instead of search"}), false)
            .cache(CachePolicy::Search)
            .required_scope(DEFAULT_SCOPE)
            .category("search")
            .metadata("source", json!("shodan"))
            .metadata("requires_api_key", json!(true))
            .build()
    }

    async fn execute(&self, args: &ToolArgs, _client: &ClientIdentity) -> Result<ToolOutput> {
        self.api_key()?;
        if let Some(ip) = optional_str(args, "ip")? {
            return Ok(self.host(ip).await?.into());
        }
        let query = optional_str(args, "query")?
            .ok_or_else(|| OsintError::invalid_input("either `query` or `ip` is required"))?;
        let facets = optional_str(args, "facets")?;
        let page = optional_u64(args, "page")?.unwrap_or(1).max(1);
        Ok(self.search(query, facets, page).await?.into())
    }

    fn cache_ttl(&self, args: &ToolArgs) -> Option<Duration> {
        if matches!(optional_str(args, "ip"), Ok(Some(_))) {
            Some(CachePolicy::Host.ttl())
        } else {
            Some(CachePolicy::Search.ttl())
        }
    }

    fn rate_limit_key(&self, _args: &ToolArgs) -> String {
        "shodan".to_string()
    }
}
