use reqwest::Url;
use tracing::warn;

#[derive(Clone, Debug, PartialEq, Eq)]
struct AllowEntry {
    scheme: String,
    host: String,
    port: Option<u16>,
    path: String,
}

impl AllowEntry {
    fn parse(raw: &str) -> Option<Self> {
        let url = Url::parse(raw.trim()).ok()?;
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        Some(Self {
            scheme: url.scheme().to_string(),
            host: url.host_str()?.to_ascii_lowercase(),
            port: url.port_or_known_default(),
            path: url.path().trim_end_matches('/').to_string(),
        })
    }

    fn matches(&self, url: &Url) -> bool {
        let Some(host) = url.host_str().map(str::to_ascii_lowercase) else {
            return false;
        };
        if url.scheme() != self.scheme || url.port_or_known_default() != self.port {
            return false;
        }
        let host_ok = host == self.host || host.ends_with(&format!(".{}", self.host));
        if !host_ok {
            return false;
        }
        if self.path.is_empty() {
            return true;
        }
        // prefix must end on a segment boundary: /api allows /api/x, not /apix
        let path = url.path();
        path == self.path || path.starts_with(&format!("{}/", self.path))
    }
}

/// Base URLs that connectors may reach. Empty means nothing is reachable.
#[derive(Clone, Debug, Default)]
pub struct Allowlist {
    entries: Vec<AllowEntry>,
}

impl Allowlist {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries = entries
            .into_iter()
            .filter(|raw| !raw.as_ref().trim().is_empty())
            .filter_map(|raw| {
                let parsed = AllowEntry::parse(raw.as_ref());
                if parsed.is_none() {
                    warn!(entry = raw.as_ref(), "ignoring invalid allowlist entry");
                }
                parsed
            })
            .collect();
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when `url` is an entry, a subdomain of an entry, or below an
    /// entry's path. Credentials in the URL are never allowed.
    pub fn is_allowed(&self, url: &str) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        let Ok(parsed) = Url::parse(url.trim()) else {
            return false;
        };
        if !parsed.username().is_empty() || parsed.password().is_some() {
            return false;
        }
        self.entries.iter().any(|entry| entry.matches(&parsed))
    }
}
