use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::auth::{ApiKeyAuthenticator, Authenticator, ClientIdentity};
use crate::cache::Cache;
use crate::config::Settings;
use crate::connector::ConnectorManager;
use crate::dispatch::{Dispatcher, InvokeResponse};
use crate::error::Result;
use crate::http::{DynHttpClient, ReqwestHttpClient};
use crate::rate_limit::RateLimiter;
use crate::tools::{register_builtin_tools, ToolDefinition, ToolRegistry};

/// Process-wide context: constructed once at startup, then shared read-only
/// with every transport. Mutation happens only inside the registry and the
/// rate limiter, both behind their own locks.
#[derive(Clone)]
pub struct OsintServer {
    settings: Arc<Settings>,
    registry: Arc<ToolRegistry>,
    connectors: Arc<ConnectorManager>,
    dispatcher: Dispatcher,
    authenticator: Arc<dyn Authenticator>,
}

impl OsintServer {
    /// Production wiring: real HTTP client, configured cache backend and the
    /// built-in tools.
    pub async fn bootstrap(settings: Settings) -> Result<Self> {
        settings.validate()?;
        let cache = Cache::connect(settings.redis_url.as_deref(), settings.cache_timeout).await;
        let http: DynHttpClient = Arc::new(ReqwestHttpClient::new(settings.user_agent.clone())?);
        let server = Self::builder(settings).cache(cache).http(http).build()?;
        info!(
            tools = server.registry.len(),
            cache = server.dispatcher.cache().backend_name(),
            connectors = server.connectors.is_enabled(),
            "osint server ready"
        );
        Ok(server)
    }

    pub fn builder(settings: Settings) -> OsintServerBuilder {
        OsintServerBuilder::new(settings)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn connectors(&self) -> &Arc<ConnectorManager> {
        &self.connectors
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn list_definitions(&self) -> Vec<ToolDefinition> {
        self.registry.list_definitions()
    }

    /// Resolves the credential, then dispatches. Authentication failures are
    /// rendered like any other error.
    pub async fn invoke(&self, tool: &str, params: Value, credential: Option<&str>) -> InvokeResponse {
        match self.authenticator.identify(credential) {
            Ok(identity) => self.invoke_as(tool, params, &identity).await,
            Err(err) => {
                warn!(tool, "request rejected by authenticator");
                InvokeResponse::failure(tool.trim(), &err)
            }
        }
    }

    pub async fn invoke_as(&self, tool: &str, params: Value, client: &ClientIdentity) -> InvokeResponse {
        self.dispatcher.respond(tool, params, client).await
    }

    pub async fn discover(&self, base_url: &str) -> Result<Vec<String>> {
        self.connectors.discover_and_register(base_url, &self.registry).await
    }
}

/// Wiring for tests and embedders; anything not supplied gets the
/// production default.
pub struct OsintServerBuilder {
    settings: Settings,
    cache: Option<Cache>,
    http: Option<DynHttpClient>,
    authenticator: Option<Arc<dyn Authenticator>>,
    register_builtins: bool,
}

impl OsintServerBuilder {
    fn new(settings: Settings) -> Self {
        Self {
            settings,
            cache: None,
            http: None,
            authenticator: None,
            register_builtins: true,
        }
    }

    pub fn cache(mut self, cache: Cache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn http(mut self, http: DynHttpClient) -> Self {
        self.http = Some(http);
        self
    }

    pub fn authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    pub fn without_builtins(mut self) -> Self {
        self.register_builtins = false;
        self
    }

    pub fn build(self) -> Result<OsintServer> {
        let settings = self.settings;
        let cache = self.cache.unwrap_or_else(Cache::in_memory);
        let http: DynHttpClient = match self.http {
            Some(http) => http,
            None => Arc::new(ReqwestHttpClient::new(settings.user_agent.clone())?),
        };
        let authenticator = self
            .authenticator
            .unwrap_or_else(|| Arc::new(ApiKeyAuthenticator::new(settings.api_key.clone())));

        let registry = Arc::new(ToolRegistry::new());
        let limiter = Arc::new(RateLimiter::new(settings.rate_limit_per_minute));
        let connectors = Arc::new(ConnectorManager::from_settings(&settings, Arc::clone(&http), cache.clone()));
        if self.register_builtins {
            register_builtin_tools(&registry, &settings, http, &connectors)?;
        }
        let dispatcher = Dispatcher::new(Arc::clone(&registry), cache, limiter)
            .with_execution_timeout(settings.execution_timeout);

        Ok(OsintServer {
            settings: Arc::new(settings),
            registry,
            connectors,
            dispatcher,
            authenticator,
        })
    }
}
