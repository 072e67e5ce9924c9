use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::auth::{ClientIdentity, DEFAULT_SCOPE};
use crate::error::{OsintError, Result};
use crate::http::{DynHttpClient, OutboundRequest};
use crate::tools::definition::{CachePolicy, ToolDefinition};
use crate::tools::result::{ToolOutput, ToolResult};
use crate::tools::tool::{required_str, Tool, ToolArgs};
use crate::utils::TargetValidator;

const IP_API_URL: &str = "http://ip-api.com/json";
const ABUSEIPDB_URL: &str = "https://api.abuseipdb.com/api/v2/check";
const MAX_REPORT_AGE_DAYS: &str = "90";

fn ip_param() -> Value {
    json!({"type": "string", "description": "Public IPv4 or IPv6 address"})
}

fn ip_rate_key(prefix: &str, args: &ToolArgs) -> String {
    let ip = args.get("ip").and_then(Value::as_str).unwrap_or_default().trim();
    format!("{prefix}:{ip}")
}

/// Picks `(output_key, upstream_key)` pairs out of an upstream object.
fn project(source: &Value, fields: &[(&str, &str)]) -> Map<String, Value> {
    fields
        .iter()
        .map(|(out, upstream)| ((*out).to_string(), source.get(*upstream).cloned().unwrap_or(Value::Null)))
        .collect()
}

/// Geolocation and network ownership via ip-api.com.
pub struct IpInfoTool {
    http: DynHttpClient,
    timeout: Duration,
    validator: Arc<TargetValidator>,
    base_url: String,
}

impl IpInfoTool {
    pub fn new(http: DynHttpClient, timeout: Duration, validator: Arc<TargetValidator>) -> Self {
        Self {
            http,
            timeout,
            validator,
            base_url: IP_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl Tool for IpInfoTool {
    fn name(&self) -> &str {
        "ip_info"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::builder(self.name())
            .description("Geolocation and network information for a public IP address.")
            .param("ip", ip_param(), true)
            .cache(CachePolicy::Host)
            .required_scope(DEFAULT_SCOPE)
            .category("ip")
            .metadata("source", json!("ip-api.com"))
            .build()
    }

    async fn execute(&self, args: &ToolArgs, _client: &ClientIdentity) -> Result<ToolOutput> {
        let ip = self.validator.validate_public_ip(required_str(args, "ip")?)?.to_string();
        let request = OutboundRequest::get(format!("{}/{ip}", self.base_url), self.timeout)
            .header("user-agent", self.http.user_agent());
        let body = self.http.send(request).await?.error_for_status("ip-api.com")?.json()?;

        if body.get("status").and_then(Value::as_str) == Some("fail") {
            let reason = body.get("message").and_then(Value::as_str).unwrap_or("unknown error");
            return Err(OsintError::execution_failed(format!("ip lookup failed: {reason}")));
        }

        let mut data = project(
            &body,
            &[
                ("country", "country"),
                ("country_code", "countryCode"),
                ("region", "regionName"),
                ("region_code", "region"),
                ("city", "city"),
                ("zip_code", "zip"),
                ("latitude", "lat"),
                ("longitude", "lon"),
                ("timezone", "timezone"),
                ("isp", "isp"),
                ("organization", "org"),
                ("as_number", "as"),
            ],
        );
        data.insert("ip".into(), json!(ip));

        let place: Vec<&str> = ["city", "country"]
            .iter()
            .filter_map(|k| data.get(*k).and_then(Value::as_str))
            .collect();
        let text = if place.is_empty() {
            format!("IP {ip}: location unknown")
        } else {
            format!("IP {ip}: {}", place.join(", "))
        };
        Ok(ToolResult::new(text)
            .with_data(data)
            .with_meta("source", json!("ip-api.com"))
            .into())
    }

    fn rate_limit_key(&self, args: &ToolArgs) -> String {
        ip_rate_key("ipinfo", args)
    }
}

/// Abuse reports via AbuseIPDB.
pub struct IpReputationTool {
    http: DynHttpClient,
    api_key: Option<String>,
    timeout: Duration,
    validator: Arc<TargetValidator>,
    base_url: String,
}

impl IpReputationTool {
    pub fn new(
        http: DynHttpClient,
        api_key: Option<String>,
        timeout: Duration,
        validator: Arc<TargetValidator>,
    ) -> Self {
        Self {
            http,
            api_key,
            timeout,
            validator,
            base_url: ABUSEIPDB_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl Tool for IpReputationTool {
    fn name(&self) -> &str {
        "ip_reputation"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::builder(self.name())
            .description("Abuse confidence score and report count for a public IP (AbuseIPDB).")
            .param("ip", ip_param(), true)
            .cache(CachePolicy::Host)
            .required_scope(DEFAULT_SCOPE)
            .category("ip")
            .metadata("source", json!("abuseipdb"))
            .metadata("requires_api_key", json!(true))
            .build()
    }

    async fn execute(&self, args: &ToolArgs, _client: &ClientIdentity) -> Result<ToolOutput> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| OsintError::unavailable("ABUSEIPDB_API_KEY is not configured"))?;
        let ip = self.validator.validate_public_ip(required_str(args, "ip")?)?.to_string();

        let request = OutboundRequest::get(&self.base_url, self.timeout)
            .query("ipAddress", ip.as_str())
            .query("maxAgeInDays", MAX_REPORT_AGE_DAYS)
            .header("key", api_key)
            .header("accept", "application/json");
        let body = self.http.send(request).await?.error_for_status("abuseipdb")?.json()?;
        let report = body.get("data").cloned().unwrap_or_else(|| json!({}));

        let mut data = project(
            &report,
            &[
                ("abuse_confidence_score", "abuseConfidenceScore"),
                ("total_reports", "totalReports"),
                ("is_public", "isPublic"),
                ("is_whitelisted", "isWhitelisted"),
                ("country_code", "countryCode"),
                ("usage_type", "usageType"),
                ("isp", "isp"),
                ("domain", "domain"),
            ],
        );
        data.insert("ip".into(), json!(ip));

        let score = report.get("abuseConfidenceScore").and_then(Value::as_u64);
        let text = match score {
            Some(score) => format!("IP {ip}: abuse confidence {score}%"),
            None => format!("IP {ip}: no reputation data"),
        };
        Ok(ToolResult::new(text)
            .with_data(data)
            .with_meta("source", json!("abuseipdb"))
            .into())
    }

    fn rate_limit_key(&self, args: &ToolArgs) -> String {
        ip_rate_key("ipreput", args)
    }
}
