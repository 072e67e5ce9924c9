//! Allowlisted discovery of external API documents, tool synthesis and
//! proxying.

mod allowlist;
mod gradio;
mod openapi;
mod proxied;
mod synthesize;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

pub use allowlist::Allowlist;
pub use gradio::GradioConnectorTool;
pub use openapi::OpenApiConnectorTool;
pub use proxied::ProxiedTool;
pub use synthesize::{
    is_gradio_document, is_openapi_document, sanitize_name, synthesize_gradio, synthesize_openapi,
    OperationDescriptor,
};

use crate::cache::{build_cache_key, Cache};
use crate::config::Settings;
use crate::error::{OsintError, Result};
use crate::http::{DynHttpClient, HttpMethod, OutboundRequest};
use crate::tools::{CachePolicy, ToolRegistry};

pub const SPEC_PATHS: &[&str] = &["/openapi.json", "/swagger.json", "/info", "/config", "/api"];
pub const GRADIO_SPEC_PATHS: &[&str] = &["/info", "/config"];

/// Credentials forwarded to the upstream. Never logged.
#[derive(Clone, Default, Deserialize, Serialize)]
pub struct ProxyAuth {
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub query: BTreeMap<String, String>,
}

impl std::fmt::Debug for ProxyAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyAuth")
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("query", &self.query.keys().collect::<Vec<_>>())
            .finish()
    }
}

pub struct ConnectorManager {
    allowlist: Allowlist,
    http: DynHttpClient,
    cache: Cache,
    spec_timeout: Duration,
    proxy_timeout: Duration,
}

impl ConnectorManager {
    pub fn new(allowlist: Allowlist, http: DynHttpClient, cache: Cache) -> Self {
        if allowlist.is_empty() {
            info!("connector allowlist is empty, proxied connectors are disabled");
        }
        Self {
            allowlist,
            http,
            cache,
            spec_timeout: Duration::from_secs(8),
            proxy_timeout: Duration::from_secs(20),
        }
    }

    pub fn from_settings(settings: &Settings, http: DynHttpClient, cache: Cache) -> Self {
        Self::new(Allowlist::new(&settings.connector_allowlist), http, cache)
            .with_timeouts(settings.spec_timeout, settings.connector_timeout)
    }

    pub fn with_timeouts(mut self, spec_timeout: Duration, proxy_timeout: Duration) -> Self {
        self.spec_timeout = spec_timeout;
        self.proxy_timeout = proxy_timeout;
        self
    }

    pub fn allowlist(&self) -> &Allowlist {
        &self.allowlist
    }

    pub fn is_enabled(&self) -> bool {
        !self.allowlist.is_empty()
    }

    pub fn is_allowed(&self, base_url: &str) -> bool {
        self.allowlist.is_allowed(base_url)
    }

    fn ensure_allowed(&self, url: &str) -> Result<()> {
        if self.is_allowed(url) {
            Ok(())
        } else {
            warn!(base_url = url, "url rejected by connector allowlist");
            Err(OsintError::forbidden(format!("{url} is not in the connector allowlist")))
        }
    }

    /// First OpenAPI/Swagger document found under `base_url`, cached for an hour.
    pub async fn fetch_spec(&self, base_url: &str) -> Result<Option<Value>> {
        self.fetch_document("connector_spec", base_url, SPEC_PATHS, is_openapi_document)
            .await
    }

    /// Gradio `/info` or `/config` document, cached like `fetch_spec`.
    pub async fn fetch_gradio_spec(&self, base_url: &str) -> Result<Option<Value>> {
        self.fetch_document("gradio_spec", base_url, GRADIO_SPEC_PATHS, is_gradio_document)
            .await
    }

    async fn fetch_document(
        &self,
        kind: &str,
        base_url: &str,
        paths: &[&str],
        accept: fn(&Value) -> bool,
    ) -> Result<Option<Value>> {
        self.ensure_allowed(base_url)?;
        let base = base_url.trim().trim_end_matches('/');
        let cache_key = build_cache_key(kind, &json!(base));
        if let Some(doc) = self.cache.get(&cache_key).await {
            if accept(&doc) {
                debug!(base_url = base, kind, "spec cache hit");
                return Ok(Some(doc));
            }
        }

        for path in paths {
            let url = format!("{base}{path}");
            let request = OutboundRequest::get(&url, self.spec_timeout).header("accept", "application/json");
            let response = match self.http.send(request).await {
                Ok(response) if response.is_success() => response,
                Ok(response) => {
                    debug!(path, status = response.status, "no spec at path");
                    continue;
                }
                Err(err) => {
                    debug!(path, error = %err, "spec request failed");
                    continue;
                }
            };
            let Ok(doc) = response.json() else {
                debug!(path, "spec path returned non-JSON body");
                continue;
            };
            if !accept(&doc) {
                continue;
            }
            info!(base_url = base, path, kind, "discovered API document");
            self.cache.set(&cache_key, &doc, Some(CachePolicy::Spec.ttl())).await;
            return Ok(Some(doc));
        }

        warn!(base_url = base, kind, "no API document found");
        Ok(None)
    }

    pub fn synthesize_tools(&self, base_url: &str, spec: &Value) -> Vec<OperationDescriptor> {
        if is_openapi_document(spec) {
            synthesize_openapi(base_url, spec)
        } else {
            synthesize_gradio(base_url, spec)
        }
    }

    /// Discovers `base_url` and registers one [`ProxiedTool`] per operation.
    /// Operations named like a native tool are skipped; the returned names
    /// are the ones actually registered.
    pub async fn discover_and_register(
        self: &Arc<Self>,
        base_url: &str,
        registry: &ToolRegistry,
    ) -> Result<Vec<String>> {
        let spec = self
            .fetch_spec(base_url)
            .await?
            .ok_or_else(|| OsintError::invalid_input(format!("no API spec found at {base_url}")))?;
        let descriptors = self.synthesize_tools(base_url, &spec);
        let total = descriptors.len();
        let mut names = Vec::with_capacity(total);
        for descriptor in descriptors {
            let name = descriptor.name.clone();
            if registry.register_discovered(Arc::new(ProxiedTool::new(Arc::clone(self), descriptor)))? {
                names.push(name);
            }
        }
        if names.len() < total {
            warn!(base_url, skipped = total - names.len(), "some discovered operations were not registered");
        }
        info!(base_url, count = names.len(), "registered connector tools");
        Ok(names)
    }

    /// Forwards one call. The allowlist is checked again here, on the final URL,
    /// before any network traffic.
    pub async fn proxy_invoke(
        &self,
        base_url: &str,
        path: &str,
        method: &str,
        params: &Map<String, Value>,
        auth: Option<&ProxyAuth>,
    ) -> Result<Value> {
        self.ensure_allowed(base_url)?;
        let method = HttpMethod::parse(method)
            .ok_or_else(|| OsintError::invalid_input(format!("unsupported HTTP method `{method}`")))?;
        let url = join_path(base_url, path)?;
        self.ensure_allowed(&url)?;

        let mut request = OutboundRequest::new(method, &url, self.proxy_timeout).header("accept", "application/json");
        match method {
            HttpMethod::Get | HttpMethod::Delete | HttpMethod::Head => {
                for (key, value) in params {
                    request = request.query(key.as_str(), query_value(value));
                }
            }
            _ => {
                let body = match params.get("body") {
                    Some(body) if params.len() == 1 => body.clone(),
                    _ => Value::Object(params.clone()),
                };
                request = request.json(body);
            }
        }
        if let Some(auth) = auth {
            for (key, value) in &auth.headers {
                request = request.header(key.as_str(), value.as_str());
            }
            for (key, value) in &auth.query {
                request = request.query(key.as_str(), value.as_str());
            }
        }

        info!(base_url, method = method.as_str(), path, "proxying connector call");
        let response = self.http.send(request).await.map_err(|err| {
            warn!(method = method.as_str(), path, error = %err, "connector call failed");
            err
        })?;
        let response = response.error_for_status("connector")?;
        Ok(response.json_or_text())
    }

    /// POSTs `{"data": [arguments]}` to `/run/<fn>`, `/api/<fn>` and
    /// `/api/predict`, in that order. First 2xx wins.
    pub async fn gradio_invoke(&self, base_url: &str, function: &str, arguments: &Value) -> Result<Value> {
        self.ensure_allowed(base_url)?;
        let function = function.trim().trim_start_matches('/');
        if function.is_empty() || sanitize_name(function) != function {
            return Err(OsintError::invalid_input(format!("invalid gradio function name `{function}`")));
        }

        let payload = json!({ "data": [arguments] });
        let mut last_err = None;
        for path in [format!("/run/{function}"), format!("/api/{function}"), "/api/predict".to_string()] {
            let url = join_path(base_url, &path)?;
            let request = OutboundRequest::new(HttpMethod::Post, &url, self.proxy_timeout).json(payload.clone());
            match self.http.send(request).await.and_then(|r| r.error_for_status("gradio")) {
                Ok(response) => {
                    info!(base_url, path = %path, "gradio function invoked");
                    return Ok(response.json_or_text());
                }
                Err(err) => {
                    debug!(path = %path, error = %err, "gradio endpoint failed");
                    last_err = Some(err);
                }
            }
        }
        Err(match last_err {
            Some(err @ OsintError::Forbidden(_)) | Some(err @ OsintError::RateLimitExceeded { .. }) => err,
            _ => OsintError::execution_failed(format!("no gradio endpoint answered for `{function}`")),
        })
    }
}

/// Appends `path` to `base_url`. Rejects traversal and absolute URLs.
pub fn join_path(base_url: &str, path: &str) -> Result<String> {
    let path = path.trim();
    if !path.starts_with('/') || path.starts_with("//") || path.contains("..") || path.contains("://") {
        return Err(OsintError::invalid_input(format!("invalid proxy path `{path}`")));
    }
    let joined = format!("{}{path}", base_url.trim().trim_end_matches('/'));
    Url::parse(&joined).map_err(|_| OsintError::invalid_input("invalid connector url"))?;
    Ok(joined)
}

pub fn host_of(url: &str) -> String {
    Url::parse(url.trim())
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        .unwrap_or_default()
}

fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_rejects_escapes() {
        assert_eq!(
            join_path("https://good.example/api/", "/v1/items").unwrap(),
            "https://good.example/api/v1/items"
        );
        assert!(join_path("https://good.example", "v1").is_err());
        assert!(join_path("https://good.example", "/../admin").is_err());
        assert!(join_path("https://good.example", "//evil.example/x").is_err());
        assert!(join_path("https://good.example", "/redirect?to=https://evil.example").is_err());
    }

    #[test]
    fn proxy_auth_debug_hides_values() {
        let mut auth = ProxyAuth::default();
        auth.headers.insert("Authorization".into(), "Bearer secret-token".into());
        let rendered = format!("{auth:?}");
        assert!(rendered.contains("Authorization"));
        assert!(!rendered.contains("secret-token"));
    }
}
