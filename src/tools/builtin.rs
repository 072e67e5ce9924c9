use std::sync::Arc;

use tracing::info;

use crate::config::Settings;
use crate::connector::{ConnectorManager, GradioConnectorTool, OpenApiConnectorTool};
use crate::error::Result;
use crate::http::DynHttpClient;
use crate::tools::dns::{DnsLookupTool, DohResolver, ReverseDnsTool};
use crate::tools::domain_recon::{DomainReconTool, PublicReconSource};
use crate::tools::ip::{IpInfoTool, IpReputationTool};
use crate::tools::shodan::ShodanTool;
use crate::tools::web::{HttpHeadersTool, MetadataTool, RobotsTxtTool, SslCheckTool, WebFetcher};
use crate::tools::{Tool, ToolRegistry};
use crate::utils::TargetValidator;

/// Registers the native OSINT tools, plus the connector tools when the
/// allowlist has at least one entry.
pub fn register_builtin_tools(
    registry: &Arc<ToolRegistry>,
    settings: &Settings,
    http: DynHttpClient,
    connectors: &Arc<ConnectorManager>,
) -> Result<()> {
    let validator = Arc::new(TargetValidator::new(settings.blocked_domains.clone()));
    let timeout = settings.request_timeout;
    let resolver = DohResolver::new(Arc::clone(&http), timeout);

    let web = WebFetcher::new(Arc::clone(&http), timeout, Arc::clone(&validator))
        .respect_robots(settings.respect_robots_txt);

    let source = Arc::new(PublicReconSource::new(Arc::clone(&http), resolver.clone(), timeout));
    let mut tools: Vec<Arc<dyn Tool>> = vec![
        Arc::new(DomainReconTool::new(source, Arc::clone(&validator))),
        Arc::new(DnsLookupTool::new(resolver.clone(), Arc::clone(&validator))),
        Arc::new(ReverseDnsTool::new(resolver, Arc::clone(&validator))),
        Arc::new(IpInfoTool::new(Arc::clone(&http), timeout, Arc::clone(&validator))),
        Arc::new(ShodanTool::new(
            Arc::clone(&http),
            settings.shodan_api_key.clone(),
            settings.connector_timeout,
            Arc::clone(&validator),
        )),
        Arc::new(IpReputationTool::new(
            Arc::clone(&http),
            settings.abuseipdb_api_key.clone(),
            timeout,
            Arc::clone(&validator),
        )),
        Arc::new(RobotsTxtTool::new(web.clone())),
        Arc::new(HttpHeadersTool::new(web.clone())),
        Arc::new(MetadataTool::new(web.clone())),
        Arc::new(SslCheckTool::new(web)),
    ];

    if connectors.is_enabled() {
        tools.push(Arc::new(OpenApiConnectorTool::new(Arc::clone(connectors), registry)));
        tools.push(Arc::new(GradioConnectorTool::new(Arc::clone(connectors))));
    }

    for tool in tools {
        registry.register(tool)?;
    }
    info!(tools = registry.len(), "built-in tools registered");
    Ok(())
}
