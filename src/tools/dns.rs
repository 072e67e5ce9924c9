use std::fmt::Write as _;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::auth::{ClientIdentity, DEFAULT_SCOPE};
use crate::error::{OsintError, Result};
use crate::http::{DynHttpClient, OutboundRequest};
use crate::tools::definition::{CachePolicy, ToolDefinition};
use crate::tools::result::{ToolOutput, ToolResult};
use crate::tools::tool::{optional_str, required_str, Tool, ToolArgs};
use crate::utils::TargetValidator;

pub const DEFAULT_DOH_ENDPOINT: &str = "https://cloudflare-dns.com/dns-query";

pub const SUPPORTED_RECORD_TYPES: &[&str] = &["A", "AAAA", "MX", "NS", "TXT", "CNAME", "SOA", "CAA"];

fn record_type_code(record_type: &str) -> Option<u64> {
    Some(match record_type {
        "A" => 1,
        "NS" => 2,
        "CNAME" => 5,
        "SOA" => 6,
        "MX" => 15,
        "TXT" => 16,
        "AAAA" => 28,
        "CAA" => 257,
        "PTR" => 12,
        _ => return None,
    })
}

/// `in-addr.arpa` / `ip6.arpa` name for a PTR query.
pub fn reverse_name(ip: &IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, c, d] = v4.octets();
            format!("{d}.{c}.{b}.{a}.in-addr.arpa")
        }
        IpAddr::V6(v6) => {
            let mut name = String::with_capacity(72);
            for byte in v6.octets().iter().rev() {
                let _ = write!(name, "{:x}.{:x}.", byte & 0x0f, byte >> 4);
            }
            name.push_str("ip6.arpa");
            name
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DnsAnswer {
    pub records: Vec<String>,
    pub ttl: Option<u64>,
}

/// DNS-over-HTTPS JSON resolver.
#[derive(Clone)]
pub struct DohResolver {
    http: DynHttpClient,
    endpoint: String,
    timeout: Duration,
}

impl DohResolver {
    pub fn new(http: DynHttpClient, timeout: Duration) -> Self {
        Self {
            http,
            endpoint: DEFAULT_DOH_ENDPOINT.to_string(),
            timeout,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub async fn resolve(&self, domain: &str, record_type: &str) -> Result<DnsAnswer> {
        let code = record_type_code(record_type).ok_or_else(|| {
            OsintError::invalid_input(format!("unsupported record type `{record_type}`"))
        })?;
        let request = OutboundRequest::get(&self.endpoint, self.timeout)
            .query("name", domain)
            .query("type", record_type)
            .header("accept", "application/dns-json")
            .header("user-agent", self.http.user_agent());
        let body = self.http.send(request).await?.error_for_status("dns resolver")?.json()?;

        // RCODE 3 = NXDOMAIN
        match body.get("Status").and_then(Value::as_u64) {
            Some(0) => {}
            Some(3) => return Err(OsintError::invalid_input(format!("domain not found: {domain}"))),
            Some(rcode) => {
                return Err(OsintError::execution_failed(format!("dns query failed (rcode {rcode})")))
            }
            None => return Err(OsintError::execution_failed("malformed dns response")),
        }

        let mut answer = DnsAnswer::default();
        for entry in body.get("Answer").and_then(Value::as_array).into_iter().flatten() {
            if entry.get("type").and_then(Value::as_u64) != Some(code) {
                continue;
            }
            if let Some(data) = entry.get("data").and_then(Value::as_str) {
                answer.records.push(data.trim_matches('"').to_string());
            }
            if let Some(ttl) = entry.get("TTL").and_then(Value::as_u64) {
                answer.ttl = Some(answer.ttl.map_or(ttl, |current| current.min(ttl)));
            }
        }
        debug!(domain, record_type, count = answer.records.len(), "dns answer");
        Ok(answer)
    }

    /// PTR lookup. Hostnames come back without the trailing dot.
    pub async fn reverse(&self, ip: &IpAddr) -> Result<DnsAnswer> {
        let mut answer = self.resolve(&reverse_name(ip), "PTR").await.map_err(|err| match err {
            OsintError::InvalidInput(_) => {
                OsintError::invalid_input(format!("no reverse DNS record found for {ip}"))
            }
            other => other,
        })?;
        for record in &mut answer.records {
            let trimmed = record.trim_end_matches('.').len();
            record.truncate(trimmed);
        }
        Ok(answer)
    }
}

pub struct DnsLookupTool {
    resolver: DohResolver,
    validator: Arc<TargetValidator>,
}

impl DnsLookupTool {
    pub fn new(resolver: DohResolver, validator: Arc<TargetValidator>) -> Self {
        Self { resolver, validator }
    }
}

#[async_trait]
impl Tool for DnsLookupTool {
    fn name(&self) -> &str {
        "dns_lookup"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::builder(self.name())
            .description("Resolve DNS records for a public domain (A, AAAA, MX, NS, TXT, CNAME, SOA, CAA).")
            .param("domain", json!({"type": "string", "description": "Domain to resolve"}), true)
            .param(
                "record_type",
                json!({"type": "string", "enum": SUPPORTED_RECORD_TYPES, "default": "A"}),
                false,
            )
            .cache(CachePolicy::Host)
            .required_scope(DEFAULT_SCOPE)
            .category("dns")
            .build()
    }

    async fn execute(&self, args: &ToolArgs, _client: &ClientIdentity) -> Result<ToolOutput> {
        let domain = self.validator.validate_domain(required_str(args, "domain")?)?;
        let record_type = optional_str(args, "record_type")?
            .unwrap_or("A")
            .to_ascii_uppercase();
        if !SUPPORTED_RECORD_TYPES.contains(&record_type.as_str()) {
            return Err(OsintError::invalid_input(format!(
                "unsupported record type `{record_type}`, expected one of {}",
                SUPPORTED_RECORD_TYPES.join(", ")
            )));
        }

        let answer = self.resolver.resolve(&domain, &record_type).await?;
        let text = if answer.records.is_empty() {
            format!("No {record_type} records found for {domain}")
        } else {
            format!(
                "{} {record_type} record(s) for {domain}: {}",
                answer.records.len(),
                answer.records.join(", ")
            )
        };

        Ok(ToolResult::new(text)
            .with_field("domain", json!(domain))
            .with_field("record_type", json!(record_type))
            .with_field("records", json!(answer.records))
            .with_field("ttl", json!(answer.ttl))
            .with_meta("source", json!("doh"))
            .into())
    }

    fn rate_limit_key(&self, args: &ToolArgs) -> String {
        let domain = args
            .get("domain")
            .and_then(Value::as_str)
            .map(|d| d.trim().to_lowercase())
            .unwrap_or_default();
        format!("dns:{domain}")
    }
}

/// `reverse_dns_lookup`: PTR records for a public IP.
pub struct ReverseDnsTool {
    resolver: DohResolver,
    validator: Arc<TargetValidator>,
}

impl ReverseDnsTool {
    pub fn new(resolver: DohResolver, validator: Arc<TargetValidator>) -> Self {
        Self { resolver, validator }
    }
}

#[async_trait]
impl Tool for ReverseDnsTool {
    fn name(&self) -> &str {
        "reverse_dns_lookup"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::builder(self.name())
            .description("Reverse DNS lookup: hostnames (PTR records) for a public IP address.")
            .param("ip", json!({"type": "string", "description": "IPv4 or IPv6 address"}), true)
            .cache(CachePolicy::Host)
            .required_scope(DEFAULT_SCOPE)
            .category("dns")
            .build()
    }

    async fn execute(&self, args: &ToolArgs, _client: &ClientIdentity) -> Result<ToolOutput> {
        let ip = self.validator.validate_public_ip(required_str(args, "ip")?)?;
        let answer = self.resolver.reverse(&ip).await?;
        let text = if answer.records.is_empty() {
            format!("No PTR records for {ip}")
        } else {
            format!("{ip} -> {}", answer.records.join(", "))
        };

        Ok(ToolResult::new(text)
            .with_field("ip", json!(ip.to_string()))
            .with_field("hostnames", json!(answer.records))
            .with_field("ttl", json!(answer.ttl))
            .with_meta("source", json!("doh"))
            .into())
    }

    fn rate_limit_key(&self, args: &ToolArgs) -> String {
        let ip = args.get("ip").and_then(Value::as_str).unwrap_or_default().trim();
        format!("dns:reverse:{ip}")
    }
}
