use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::error::{OsintError, Result};

pub const DEFAULT_SCOPE: &str = "osint:read";
pub const ANONYMOUS_CLIENT: &str = "anonymous";

/// Caller identity resolved per request. Read-only to the dispatch core.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientIdentity {
    pub client_id: String,
    #[serde(default)]
    pub scopes: BTreeSet<String>,
}

impl ClientIdentity {
    pub fn new<I, S>(client_id: impl Into<String>, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            client_id: client_id.into(),
            scopes: scopes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn anonymous() -> Self {
        Self::new(ANONYMOUS_CLIENT, [DEFAULT_SCOPE])
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }
}

pub trait Authenticator: Send + Sync {
    fn identify(&self, credential: Option<&str>) -> Result<ClientIdentity>;
}

/// Single shared API key. With no key configured every caller is anonymous.
#[derive(Clone, Default)]
pub struct ApiKeyAuthenticator {
    api_key: Option<String>,
}

impl ApiKeyAuthenticator {
    pub fn new(api_key: Option<String>) -> Self {
        Self { api_key }
    }
}

impl Authenticator for ApiKeyAuthenticator {
    fn identify(&self, credential: Option<&str>) -> Result<ClientIdentity> {
        let Some(expected) = self.api_key.as_deref() else {
            return Ok(ClientIdentity::anonymous());
        };
        match credential {
            Some(given) if bool::from(given.as_bytes().ct_eq(expected.as_bytes())) => {
                Ok(ClientIdentity::new("demo-client", [DEFAULT_SCOPE]))
            }
            _ => {
                warn!("rejected request with missing or invalid API key");
                Err(OsintError::forbidden("invalid API key"))
            }
        }
    }
}
