pub mod auth;
pub mod cache;
pub mod cli;
pub mod config;
pub mod connector;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod rate_limit;
pub mod server;
pub mod tools;
pub mod transport;
pub mod utils;

pub use auth::{ApiKeyAuthenticator, Authenticator, ClientIdentity};
pub use cache::{build_cache_key, Cache, CacheBackend, MemoryBackend};
pub use config::Settings;
pub use connector::{Allowlist, ConnectorManager, OperationDescriptor, ProxyAuth};
pub use dispatch::{Dispatcher, InvokeError, InvokeResponse, InvokeStatus};
pub use error::{ErrorKind, OsintError, Result};
pub use http::{DynHttpClient, HttpClient, OutboundRequest, OutboundResponse};
pub use rate_limit::RateLimiter;
pub use server::{OsintServer, OsintServerBuilder};
pub use tools::{
    normalize, CachePolicy, Tool, ToolArgs, ToolDefinition, ToolOutput, ToolRegistry, ToolResult,
};
pub use utils::{logging, validation};
