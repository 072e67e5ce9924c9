pub mod builtin;
pub mod definition;
pub mod dns;
pub mod domain_recon;
pub mod ip;
pub mod registry;
pub mod result;
pub mod robots;
pub mod shodan;
pub mod tool;
pub mod web;

pub use builtin::register_builtin_tools;
pub use definition::{CachePolicy, ToolDefinition, ToolDefinitionBuilder};
pub use dns::{DnsAnswer, DnsLookupTool, DohResolver, ReverseDnsTool};
pub use domain_recon::{CertificateEntry, DnsRecord, DomainReconTool, PublicReconSource, ReconSource};
pub use ip::{IpInfoTool, IpReputationTool};
pub use registry::ToolRegistry;
pub use result::{normalize, ToolOutput, ToolResult};
pub use robots::RobotsTxt;
pub use shodan::ShodanTool;
pub use tool::{
    optional_bool, optional_object, optional_str, optional_u64, required_str, Tool, ToolArgs,
};
pub use web::{HttpHeadersTool, MetadataTool, RobotsTxtTool, SslCheckTool, WebFetcher};
