use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use super::env::EnvConfig;
use crate::error::{OsintError, Result};
use crate::utils::validate_url;

pub const DEFAULT_USER_AGENT: &str = "OSINT-MCP-Server/0.1.0 (Educational/Research Purpose)";

/// Runtime settings, built once at startup.
#[derive(Clone, Debug)]
pub struct Settings {
    pub rate_limit_per_minute: u32,
    pub user_agent: String,
    pub request_timeout: Duration,
    pub connector_timeout: Duration,
    pub spec_timeout: Duration,
    pub execution_timeout: Duration,
    pub connector_allowlist: Vec<String>,
    pub blocked_domains: Vec<String>,
    pub respect_robots_txt: bool,
    pub redis_url: Option<String>,
    pub cache_timeout: Duration,
    pub shodan_api_key: Option<String>,
    pub abuseipdb_api_key: Option<String>,
    pub api_key: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rate_limit_per_minute: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout: Duration::from_secs(30),
            connector_timeout: Duration::from_secs(20),
            spec_timeout: Duration::from_secs(8),
            execution_timeout: Duration::from_secs(60),
            connector_allowlist: Vec::new(),
            blocked_domains: Vec::new(),
            respect_robots_txt: true,
            redis_url: None,
            cache_timeout: Duration::from_secs(2),
            shodan_api_key: None,
            abuseipdb_api_key: None,
            api_key: None,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds settings from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        let settings = Self {
            rate_limit_per_minute: parse_or(&get, "OSINT_RATE_LIMIT", defaults.rate_limit_per_minute)
                .clamp(1, 60),
            user_agent: get("OSINT_USER_AGENT").unwrap_or(defaults.user_agent),
            request_timeout: Duration::from_secs(
                parse_or(&get, "OSINT_REQUEST_TIMEOUT", defaults.request_timeout.as_secs())
                    .clamp(5, 120),
            ),
            connector_timeout: secs_or(&get, "OSINT_CONNECTOR_TIMEOUT", defaults.connector_timeout),
            spec_timeout: secs_or(&get, "OSINT_SPEC_TIMEOUT", defaults.spec_timeout),
            execution_timeout: secs_or(&get, "OSINT_EXECUTION_TIMEOUT", defaults.execution_timeout),
            connector_allowlist: get("OSINT_CONNECTOR_ALLOWLIST")
                .map(|raw| EnvConfig::split_list(&raw))
                .unwrap_or_default(),
            blocked_domains: get("OSINT_BLOCKED_DOMAINS")
                .map(|raw| EnvConfig::split_list(&raw))
                .unwrap_or_default(),
            respect_robots_txt: get("OSINT_RESPECT_ROBOTS_TXT")
                .map(|raw| !matches!(raw.trim().to_ascii_lowercase().as_str(), "0" | "false" | "off" | "no"))
                .unwrap_or(defaults.respect_robots_txt),
            redis_url: get("REDIS_URL"),
            cache_timeout: secs_or(&get, "OSINT_CACHE_TIMEOUT", defaults.cache_timeout),
            shodan_api_key: optional_key(&get, "SHODAN_API_KEY"),
            abuseipdb_api_key: optional_key(&get, "ABUSEIPDB_API_KEY"),
            api_key: optional_key(&get, "OSINT_API_KEY"),
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        for entry in &self.connector_allowlist {
            validate_url(entry).map_err(|_| {
                OsintError::Config(format!(
                    "OSINT_CONNECTOR_ALLOWLIST entry `{entry}` must be an absolute http(s) URL"
                ))
            })?;
        }
        Ok(())
    }

    pub fn with_allowlist<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.connector_allowlist = entries.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_rate_limit(mut self, per_minute: u32) -> Self {
        self.rate_limit_per_minute = per_minute.max(1);
        self
    }
}

fn parse_or<G, T>(get: &G, key: &str, default: T) -> T
where
    G: Fn(&str) -> Option<String>,
    T: FromStr + Copy,
{
    match get(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "invalid numeric setting, using default");
            default
        }),
        None => default,
    }
}

fn secs_or<G>(get: &G, key: &str, default: Duration) -> Duration
where
    G: Fn(&str) -> Option<String>,
{
    Duration::from_secs(parse_or(get, key, default.as_secs()).max(1))
}

fn optional_key<G>(get: &G, key: &str) -> Option<String>
where
    G: Fn(&str) -> Option<String>,
{
    let raw = get(key)?;
    EnvConfig::resolve_api_key(&raw, key, |var| get(var))
        .ok()
        .filter(|value| !value.starts_with("your_"))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings_from(pairs: &[(&str, &str)]) -> Result<Settings> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let settings = settings_from(&[]).unwrap();
        assert_eq!(settings.rate_limit_per_minute, 10);
        assert_eq!(settings.user_agent, DEFAULT_USER_AGENT);
        assert!(settings.connector_allowlist.is_empty());
        assert!(settings.redis_url.is_none());
        assert!(settings.shodan_api_key.is_none());
        assert!(settings.respect_robots_txt);
    }

    #[test]
    fn robots_txt_can_be_ignored() {
        let settings = settings_from(&[("OSINT_RESPECT_ROBOTS_TXT", "false")]).unwrap();
        assert!(!settings.respect_robots_txt);
    }

    #[test]
    fn numeric_values_are_clamped_and_invalid_values_ignored() {
        let settings = settings_from(&[
            ("OSINT_RATE_LIMIT", "500"),
            ("OSINT_REQUEST_TIMEOUT", "abc"),
        ])
        .unwrap();
        assert_eq!(settings.rate_limit_per_minute, 60);
        assert_eq!(settings.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn allowlist_and_keys_are_parsed() {
        let settings = settings_from(&[
            ("OSINT_CONNECTOR_ALLOWLIST", "https://good.example, https://api.other.example"),
            ("SHODAN_API_KEY", "${SHODAN_SECRET}"),
            ("SHODAN_SECRET", "s3cr3t"),
        ])
        .unwrap();
        assert_eq!(
            settings.connector_allowlist,
            vec!["https://good.example", "https://api.other.example"]
        );
        assert_eq!(settings.shodan_api_key.as_deref(), Some("s3cr3t"));
    }

    #[test]
    fn placeholder_keys_count_as_missing() {
        let settings = settings_from(&[("SHODAN_API_KEY", "your_shodan_key_here")]).unwrap();
        assert!(settings.shodan_api_key.is_none());
    }

    #[test]
    fn invalid_allowlist_entry_is_a_config_error() {
        let err = settings_from(&[("OSINT_CONNECTOR_ALLOWLIST", "good.example")]).unwrap_err();
        assert!(matches!(err, OsintError::Config(_)));
    }
}
