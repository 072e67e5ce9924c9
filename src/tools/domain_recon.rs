use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use crate::auth::{ClientIdentity, DEFAULT_SCOPE};
use crate::error::Result;
use crate::http::{DynHttpClient, OutboundRequest};
use crate::tools::definition::{CachePolicy, ToolDefinition};
use crate::tools::dns::DohResolver;
use crate::tools::result::{ToolOutput, ToolResult};
use crate::tools::tool::{optional_bool, required_str, Tool, ToolArgs};
use crate::utils::TargetValidator;

const CRT_SH_URL: &str = "https://crt.sh/";
const MAX_CT_ENTRIES: usize = 100;
const PASSIVE_RECORD_TYPES: &[&str] = &["A", "AAAA", "MX", "NS"];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateEntry {
    pub source: String,
    pub subject: String,
    pub issuer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    #[serde(rename = "type")]
    pub record_type: String,
    pub value: String,
    pub source: String,
}

/// Passive data sources behind `domain_recon`.
#[async_trait]
pub trait ReconSource: Send + Sync {
    async fn certificates(&self, domain: &str) -> Result<Vec<CertificateEntry>>;
    async fn dns_records(&self, domain: &str) -> Result<Vec<DnsRecord>>;
}

/// crt.sh certificate transparency plus DNS-over-HTTPS.
pub struct PublicReconSource {
    http: DynHttpClient,
    resolver: DohResolver,
    timeout: Duration,
}

impl PublicReconSource {
    pub fn new(http: DynHttpClient, resolver: DohResolver, timeout: Duration) -> Self {
        Self {
            http,
            resolver,
            timeout,
        }
    }
}

#[async_trait]
impl ReconSource for PublicReconSource {
    async fn certificates(&self, domain: &str) -> Result<Vec<CertificateEntry>> {
        let request = OutboundRequest::get(CRT_SH_URL, self.timeout)
            .query("q", format!("%.{domain}"))
            .query("output", "json");
        let body = self.http.send(request).await?.error_for_status("crt.sh")?.json()?;

        let mut seen = BTreeSet::new();
        let mut entries = Vec::new();
        for item in body.as_array().into_iter().flatten() {
            let Some(names) = item.get("name_value").and_then(Value::as_str) else {
                continue;
            };
            let issuer = item
                .get("issuer_name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let not_before = item
                .get("not_before")
                .and_then(Value::as_str)
                .map(str::to_string);
            // one certificate may list several SANs separated by newlines
            for name in names.lines().map(str::trim).filter(|n| !n.is_empty()) {
                if !seen.insert(name.to_lowercase()) {
                    continue;
                }
                entries.push(CertificateEntry {
                    source: "crt.sh".into(),
                    subject: name.to_string(),
                    issuer: issuer.clone(),
                    not_before: not_before.clone(),
                });
                if entries.len() >= MAX_CT_ENTRIES {
                    return Ok(entries);
                }
            }
        }
        Ok(entries)
    }

    async fn dns_records(&self, domain: &str) -> Result<Vec<DnsRecord>> {
        let lookups = PASSIVE_RECORD_TYPES
            .iter()
            .map(|record_type| async move { (*record_type, self.resolver.resolve(domain, record_type).await) });
        let mut records = Vec::new();
        let mut last_err = None;
        for (record_type, outcome) in futures::future::join_all(lookups).await {
            match outcome {
                Ok(answer) => records.extend(answer.records.into_iter().map(|value| DnsRecord {
                    record_type: record_type.to_string(),
                    value,
                    source: "doh".into(),
                })),
                Err(err) => last_err = Some(err),
            }
        }
        match (records.is_empty(), last_err) {
            (true, Some(err)) => Err(err),
            _ => Ok(records),
        }
    }
}

/// Passive domain reconnaissance. Never scans the target itself.
pub struct DomainReconTool {
    source: Arc<dyn ReconSource>,
    validator: Arc<TargetValidator>,
}

impl DomainReconTool {
    pub fn new(source: Arc<dyn ReconSource>, validator: Arc<TargetValidator>) -> Self {
        Self { source, validator }
    }
}

#[async_trait]
impl Tool for DomainReconTool {
    fn name(&self) -> &str {
        "domain_recon"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::builder(self.name())
            .description("Aggregates public OSINT data about a domain (passive only).")
            .param("domain", json!({"type": "string", "description": "Target domain"}), true)
            .param("include_ct_logs", json!({"type": "boolean", "default": true}), false)
            .param("include_passive_dns", json!({"type": "boolean", "default": true}), false)
            .cache(CachePolicy::Host)
            .required_scope(DEFAULT_SCOPE)
            .category("domain")
            .metadata("passive", json!(true))
            .build()
    }

    async fn execute(&self, args: &ToolArgs, _client: &ClientIdentity) -> Result<ToolOutput> {
        let domain = self.validator.validate_domain(required_str(args, "domain")?)?;
        let include_ct_logs = optional_bool(args, "include_ct_logs", true)?;
        let include_dns = optional_bool(args, "include_passive_dns", true)?;

        let ct_lookup = async {
            if include_ct_logs {
                self.source.certificates(&domain).await
            } else {
                Ok(Vec::new())
            }
        };
        let dns_lookup = async {
            if include_dns {
                self.source.dns_records(&domain).await
            } else {
                Ok(Vec::new())
            }
        };
        let (ct_outcome, dns_outcome) = futures::join!(ct_lookup, dns_lookup);

        // a failing source degrades to an empty section
        let mut warnings = Vec::new();
        let ct_entries = ct_outcome.unwrap_or_else(|err| {
            warn!(domain = %domain, error = %err, "certificate transparency lookup failed");
            warnings.push(format!("certificate transparency lookup failed: {}", err.client_message()));
            Vec::new()
        });
        let dns_records = dns_outcome.unwrap_or_else(|err| {
            warn!(domain = %domain, error = %err, "passive dns lookup failed");
            warnings.push(format!("passive dns lookup failed: {}", err.client_message()));
            Vec::new()
        });

        let text = format!(
            "Domain recon for {domain}: {} certificate name(s), {} DNS record(s)",
            ct_entries.len(),
            dns_records.len()
        );
        Ok(ToolResult::new(text)
            .with_field("domain", json!(domain))
            .with_field("ct_logs_included", json!(include_ct_logs))
            .with_field("passive_dns_included", json!(include_dns))
            .with_field("ct_log_entries", json!(ct_entries))
            .with_field("passive_dns_records", json!(dns_records))
            .with_field("warnings", json!(warnings))
            .with_meta("source", json!("passive"))
            .into())
    }

    fn rate_limit_key(&self, args: &ToolArgs) -> String {
        let domain = args
            .get("domain")
            .and_then(Value::as_str)
            .map(|d| d.trim().to_lowercase())
            .unwrap_or_default();
        format!("domain_recon:{domain}")
    }
}
