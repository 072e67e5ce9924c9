//! Web footprint tools: robots.txt, response headers, page metadata and
//! HTTPS availability. Every page fetch honours robots.txt unless disabled.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use scraper::{Html, Selector};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::auth::{ClientIdentity, DEFAULT_SCOPE};
use crate::error::{OsintError, Result};
use crate::http::{DynHttpClient, OutboundRequest};
use crate::tools::definition::{CachePolicy, ToolDefinition};
use crate::tools::result::{ToolOutput, ToolResult};
use crate::tools::robots::RobotsTxt;
use crate::tools::tool::{required_str, Tool, ToolArgs};
use crate::utils::TargetValidator;

pub const SECURITY_HEADERS: &[&str] = &[
    "strict-transport-security",
    "content-security-policy",
    "x-frame-options",
    "x-content-type-options",
    "referrer-policy",
    "permissions-policy",
];

const META_NAMES: &[&str] = &["description", "keywords", "author", "generator", "robots"];

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RobotsReport {
    pub robots_txt_url: String,
    pub robots_txt_exists: bool,
    pub can_fetch: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crawl_delay_seconds: Option<f64>,
}

/// Outbound plumbing shared by the web tools.
#[derive(Clone)]
pub struct WebFetcher {
    http: DynHttpClient,
    timeout: Duration,
    validator: Arc<TargetValidator>,
    respect_robots: bool,
}

impl WebFetcher {
    pub fn new(http: DynHttpClient, timeout: Duration, validator: Arc<TargetValidator>) -> Self {
        Self {
            http,
            timeout,
            validator,
            respect_robots: true,
        }
    }

    pub fn respect_robots(mut self, respect: bool) -> Self {
        self.respect_robots = respect;
        self
    }

    fn target(&self, args: &ToolArgs) -> Result<Url> {
        self.validator.validate_public_url(required_str(args, "url")?)
    }

    /// A missing or unreachable robots.txt permits everything.
    pub async fn robots(&self, url: &Url) -> RobotsReport {
        let robots_txt_url = format!("{}/robots.txt", url.origin().ascii_serialization());
        let request = OutboundRequest::get(&robots_txt_url, self.timeout).header("user-agent", self.http.user_agent());
        let body = match self.http.send(request).await {
            Ok(response) if response.status == 200 => Some(response.body),
            Ok(response) => {
                debug!(status = response.status, url = %robots_txt_url, "no robots.txt");
                None
            }
            Err(err) => {
                debug!(error = %err, url = %robots_txt_url, "robots.txt fetch failed");
                None
            }
        };

        let Some(body) = body.filter(|body| !body.trim().is_empty()) else {
            return RobotsReport {
                robots_txt_url,
                robots_txt_exists: false,
                can_fetch: true,
                crawl_delay_seconds: None,
            };
        };
        let robots = RobotsTxt::parse(&body);
        let agent = self.http.user_agent();
        let mut path = url.path().to_string();
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }
        RobotsReport {
            robots_txt_url,
            robots_txt_exists: true,
            can_fetch: robots.can_fetch(agent, &path),
            crawl_delay_seconds: robots.crawl_delay(agent),
        }
    }

    async fn ensure_permitted(&self, url: &Url) -> Result<()> {
        if !self.respect_robots {
            return Ok(());
        }
        if self.robots(url).await.can_fetch {
            Ok(())
        } else {
            info!(url = %url, "robots.txt disallows access");
            Err(OsintError::forbidden(format!("robots.txt disallows access to {url}")))
        }
    }
}

fn host_key(prefix: &str, args: &ToolArgs, key: &str) -> String {
    let raw = args.get(key).and_then(Value::as_str).unwrap_or_default().trim();
    let host = Url::parse(raw)
        .ok()
        .and_then(|url| url.host_str().map(str::to_ascii_lowercase))
        .unwrap_or_else(|| raw.to_ascii_lowercase());
    format!("{prefix}:{host}")
}

fn url_param() -> Value {
    json!({"type": "string", "format": "uri", "description": "Absolute http(s) URL"})
}

/// `check_robots_txt`
pub struct RobotsTxtTool {
    fetcher: WebFetcher,
}

impl RobotsTxtTool {
    pub fn new(fetcher: WebFetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl Tool for RobotsTxtTool {
    fn name(&self) -> &str {
        "check_robots_txt"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::builder(self.name())
            .description("Check a site's robots.txt and whether this server may fetch the given URL.")
            .param("url", url_param(), true)
            .cache(CachePolicy::Search)
            .required_scope(DEFAULT_SCOPE)
            .category("web")
            .build()
    }

    async fn execute(&self, args: &ToolArgs, _client: &ClientIdentity) -> Result<ToolOutput> {
        let url = self.fetcher.target(args)?;
        let report = self.fetcher.robots(&url).await;
        let domain = url.host_str().unwrap_or_default().to_string();
        let text = match (report.robots_txt_exists, report.can_fetch) {
            (false, _) => format!("No robots.txt for {domain}; {url} may be fetched"),
            (true, true) => format!("robots.txt for {domain} allows {url}"),
            (true, false) => format!("robots.txt for {domain} disallows {url}"),
        };

        let mut result = ToolResult::new(text)
            .with_field("url", json!(url.as_str()))
            .with_field("domain", json!(domain));
        if let Value::Object(fields) = serde_json::to_value(&report)? {
            for (key, value) in fields {
                result = result.with_field(key, value);
            }
        }
        Ok(result.into())
    }

    fn rate_limit_key(&self, args: &ToolArgs) -> String {
        host_key("robots", args, "url")
    }
}

/// `get_http_headers`: one HEAD request.
pub struct HttpHeadersTool {
    fetcher: WebFetcher,
}

impl HttpHeadersTool {
    pub fn new(fetcher: WebFetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl Tool for HttpHeadersTool {
    fn name(&self) -> &str {
        "get_http_headers"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::builder(self.name())
            .description("Fetch HTTP response headers for a URL with a single HEAD request.")
            .param("url", url_param(), true)
            .cache(CachePolicy::Search)
            .required_scope(DEFAULT_SCOPE)
            .category("web")
            .build()
    }

    async fn execute(&self, args: &ToolArgs, _client: &ClientIdentity) -> Result<ToolOutput> {
        let url = self.fetcher.target(args)?;
        self.fetcher.ensure_permitted(&url).await?;
        info!(url = %url, "fetching headers");
        let request = OutboundRequest::head(url.as_str(), self.fetcher.timeout)
            .header("user-agent", self.fetcher.http.user_agent());
        // non-2xx statuses are reported, not raised
        let response = self.fetcher.http.send(request).await?;

        let (present, missing): (Vec<&str>, Vec<&str>) = SECURITY_HEADERS
            .iter()
            .copied()
            .partition(|name| response.headers.contains_key(*name));
        let mut text = format!("HTTP {} for {url}\n", response.status);
        for (name, value) in &response.headers {
            text.push_str(&format!("{name}: {value}\n"));
        }
        if !missing.is_empty() {
            text.push_str(&format!("Missing security headers: {}", missing.join(", ")));
        }

        Ok(ToolResult::new(text)
            .with_field("url", json!(url.as_str()))
            .with_field("status_code", json!(response.status))
            .with_field("headers", json!(response.headers))
            .with_field("security_headers", json!({ "present": present, "missing": missing }))
            .into())
    }

    fn rate_limit_key(&self, args: &ToolArgs) -> String {
        host_key("http", args, "url")
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PageMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub meta_tags: BTreeMap<String, String>,
    pub open_graph: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical: Option<String>,
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|_| OsintError::execution_failed(format!("invalid selector `{css}`")))
}

fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Title, common `<meta name>` tags, OpenGraph/Twitter cards and the
/// canonical link.
pub fn parse_page_metadata(html: &str) -> Result<PageMetadata> {
    let document = Html::parse_document(html);
    let mut page = PageMetadata {
        title: document
            .select(&selector("title")?)
            .next()
            .map(|title| collapse_whitespace(&title.text().collect::<String>()))
            .filter(|title| !title.is_empty()),
        ..PageMetadata::default()
    };

    for meta in document.select(&selector("meta[content]")?) {
        let element = meta.value();
        let content = collapse_whitespace(element.attr("content").unwrap_or_default());
        if content.is_empty() {
            continue;
        }
        if let Some(name) = element.attr("name").map(str::to_ascii_lowercase) {
            if META_NAMES.contains(&name.as_str()) {
                page.meta_tags.entry(name).or_insert(content);
                continue;
            }
            if name.starts_with("twitter:") {
                page.open_graph.entry(name).or_insert(content);
                continue;
            }
        }
        if let Some(property) = element.attr("property").map(str::to_ascii_lowercase) {
            if property.starts_with("og:") {
                page.open_graph.entry(property).or_insert(content);
            }
        }
    }

    page.canonical = document
        .select(&selector(r#"link[rel="canonical"][href]"#)?)
        .next()
        .and_then(|link| link.value().attr("href"))
        .map(str::to_string);
    Ok(page)
}

/// `extract_metadata`: one GET, parsed locally.
pub struct MetadataTool {
    fetcher: WebFetcher,
}

impl MetadataTool {
    pub fn new(fetcher: WebFetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl Tool for MetadataTool {
    fn name(&self) -> &str {
        "extract_metadata"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::builder(self.name())
            .description("Extract public page metadata (title, description, OpenGraph tags) from a URL.")
            .param("url", url_param(), true)
            .cache(CachePolicy::Search)
            .required_scope(DEFAULT_SCOPE)
            .category("web")
            .build()
    }

    async fn execute(&self, args: &ToolArgs, _client: &ClientIdentity) -> Result<ToolOutput> {
        let url = self.fetcher.target(args)?;
        self.fetcher.ensure_permitted(&url).await?;
        info!(url = %url, "extracting page metadata");
        let request = OutboundRequest::get(url.as_str(), self.fetcher.timeout)
            .header("accept", "text/html,application/xhtml+xml")
            .header("user-agent", self.fetcher.http.user_agent());
        let response = self.fetcher.http.send(request).await?.error_for_status("website")?;

        let content_type = response.headers.get("content-type").cloned().unwrap_or_default();
        let page = parse_page_metadata(&response.body)?;
        let text = match (&page.title, page.meta_tags.get("description")) {
            (Some(title), Some(description)) => format!("{title}\n{description}"),
            (Some(title), None) => title.clone(),
            (None, Some(description)) => description.clone(),
            (None, None) => format!("No title or description found at {url}"),
        };

        let mut result = ToolResult::new(text)
            .with_field("url", json!(url.as_str()))
            .with_field("status_code", json!(response.status))
            .with_field("content_type", json!(content_type))
            .with_field("content_length", json!(response.body.len()));
        if let Value::Object(fields) = serde_json::to_value(&page)? {
            for (key, value) in fields {
                result = result.with_field(key, value);
            }
        }
        Ok(result.into())
    }

    fn rate_limit_key(&self, args: &ToolArgs) -> String {
        host_key("http", args, "url")
    }
}

/// `check_ssl_certificate`: whether the domain answers over HTTPS with a
/// certificate the client accepts.
pub struct SslCheckTool {
    fetcher: WebFetcher,
}

impl SslCheckTool {
    pub fn new(fetcher: WebFetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl Tool for SslCheckTool {
    fn name(&self) -> &str {
        "check_ssl_certificate"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::builder(self.name())
            .description("Check whether a domain serves HTTPS with a valid certificate, and its HSTS policy.")
            .param("domain", json!({"type": "string", "description": "Domain to check"}), true)
            .cache(CachePolicy::Host)
            .required_scope(DEFAULT_SCOPE)
            .category("web")
            .build()
    }

    async fn execute(&self, args: &ToolArgs, _client: &ClientIdentity) -> Result<ToolOutput> {
        let domain = self.fetcher.validator.validate_domain(required_str(args, "domain")?)?;
        let url = format!("https://{domain}/");
        info!(domain = %domain, "checking https");
        let request = OutboundRequest::head(&url, self.fetcher.timeout)
            .header("user-agent", self.fetcher.http.user_agent());

        let result = match self.fetcher.http.send(request).await {
            Ok(response) => {
                let hsts = response.headers.get("strict-transport-security").cloned();
                ToolResult::new(format!(
                    "{domain} serves HTTPS (HTTP {}), HSTS {}",
                    response.status,
                    if hsts.is_some() { "enabled" } else { "not set" }
                ))
                .with_field("https_enabled", json!(true))
                .with_field("status_code", json!(response.status))
                .with_field("hsts", json!(hsts))
            }
            // handshake, certificate and connect failures all land here
            Err(OsintError::ExecutionFailed(reason)) => {
                ToolResult::new(format!("{domain} does not serve valid HTTPS: {reason}"))
                    .with_field("https_enabled", json!(false))
                    .with_field("error", json!(reason))
            }
            Err(other) => return Err(other),
        };
        Ok(result.with_field("domain", json!(domain)).into())
    }

    fn rate_limit_key(&self, args: &ToolArgs) -> String {
        let domain = args.get("domain").and_then(Value::as_str).unwrap_or_default();
        format!("ssl:{}", domain.trim().to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_from_html() {
        let html = r#"<html><head>
            <title>
              Example   Domain
            </title>
            <meta name="Description" content="Illustrative examples.">
            <meta name="viewport" content="width=device-width">
            <meta property="og:site_name" content="Example">
            <meta name="twitter:card" content="summary">
            <link rel="canonical" href="https://example.com/">
        </head><body><p>hi</p></body></html>"#;
        let page = parse_page_metadata(html).unwrap();
        assert_eq!(page.title.as_deref(), Some("Example Domain"));
        assert_eq!(page.meta_tags.get("description").map(String::as_str), Some("Illustrative examples."));
        assert!(!page.meta_tags.contains_key("viewport"));
        assert_eq!(page.open_graph.get("og:site_name").map(String::as_str), Some("Example"));
        assert_eq!(page.open_graph.get("twitter:card").map(String::as_str), Some("summary"));
        assert_eq!(page.canonical.as_deref(), Some("https://example.com/"));
    }

    #[test]
    fn pages_without_markup_yield_empty_metadata() {
        let page = parse_page_metadata("plain text, no tags").unwrap();
        assert_eq!(page, PageMetadata::default());
    }

    #[test]
    fn rate_keys_use_the_host() {
        let args = json!({"url": "https://Example.com/a/b?c=1"}).as_object().cloned().unwrap();
        assert_eq!(host_key("http", &args, "url"), "http:example.com");
    }
}
