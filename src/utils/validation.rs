use std::net::IpAddr;

use crate::error::{OsintError, Result};

/// Accepts only public, well-formed OSINT targets.
pub struct TargetValidator {
    blocked_domains: Vec<String>,
}

impl Default for TargetValidator {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl TargetValidator {
    pub fn new(blocked_domains: Vec<String>) -> Self {
        Self {
            blocked_domains: blocked_domains
                .into_iter()
                .map(|d| d.trim().to_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
        }
    }

    /// Normalizes a domain: strips scheme and path, lowercases.
    ///
    /// Internal names and blocked domains are rejected.
    pub fn validate_domain(&self, raw: &str) -> Result<String> {
        let domain = normalize_domain(raw);

        if !is_valid_domain(&domain) {
            return Err(OsintError::invalid_input(format!(
                "invalid domain format: {domain}"
            )));
        }

        if domain.ends_with(".local") || domain.ends_with(".lan") {
            return Err(OsintError::invalid_input(
                "internal domains are not permitted for OSINT queries",
            ));
        }

        if self
            .blocked_domains
            .iter()
            .any(|blocked| domain == *blocked || domain.ends_with(&format!(".{blocked}")))
        {
            return Err(OsintError::forbidden(format!(
                "domain `{domain}` is blocked"
            )));
        }

        Ok(domain)
    }

    pub fn validate_ip(&self, raw: &str) -> Result<IpAddr> {
        raw.trim()
            .parse::<IpAddr>()
            .map_err(|_| OsintError::invalid_input(format!("invalid IP address: {}", raw.trim())))
    }

    /// Public addresses only.
    pub fn validate_public_ip(&self, raw: &str) -> Result<IpAddr> {
        let ip = self.validate_ip(raw)?;
        if is_private_ip(&ip) {
            return Err(OsintError::invalid_input(
                "private or internal IPs are not permitted OSINT targets",
            ));
        }
        Ok(ip)
    }

    pub fn validate_url(&self, raw: &str) -> Result<String> {
        validate_url(raw)
    }

    /// An http(s) URL whose host passes the domain or public-IP checks.
    pub fn validate_public_url(&self, raw: &str) -> Result<reqwest::Url> {
        let url = validate_url(raw)?;
        let parsed = reqwest::Url::parse(&url)
            .map_err(|_| OsintError::invalid_input(format!("invalid URL: {url}")))?;
        let host = parsed.host_str().unwrap_or_default();
        let bare = host.trim_start_matches('[').trim_end_matches(']');
        if bare.parse::<IpAddr>().is_ok() {
            self.validate_public_ip(bare)?;
        } else {
            self.validate_domain(host)?;
        }
        Ok(parsed)
    }
}

pub fn validate_url(raw: &str) -> Result<String> {
    let url = raw.trim();
    if url.is_empty() {
        return Err(OsintError::invalid_input("URL must not be empty"));
    }
    let parsed = reqwest::Url::parse(url)
        .map_err(|_| OsintError::invalid_input(format!("invalid URL: {url}")))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(OsintError::invalid_input(format!(
            "URL must be absolute http(s): {url}"
        )));
    }
    Ok(url.to_string())
}

pub fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || v4.is_documentation()
                // 100.64.0.0/10 carrier-grade NAT
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xc0) == 64)
        }
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xfe00) == 0xfc00
                || (first & 0xffc0) == 0xfe80
                || (first == 0x2001 && v6.segments()[1] == 0x0db8)
        }
    }
}

fn normalize_domain(raw: &str) -> String {
    let mut domain = raw.trim().to_lowercase();
    if let Some((_, rest)) = domain.split_once("://") {
        domain = rest.to_string();
    }
    let host = domain.split(['/', '?', '#']).next().unwrap_or_default();
    let host = host.rsplit('@').next().unwrap_or_default();
    let host = host.split(':').next().unwrap_or_default();
    host.trim_end_matches('.').to_string()
}

fn is_valid_domain(domain: &str) -> bool {
    if domain.is_empty() || domain.len() > 253 {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    let valid_labels = labels.iter().all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    });
    let tld = labels[labels.len() - 1];
    valid_labels && tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_domain() {
        let validator = TargetValidator::default();
        assert_eq!(validator.validate_domain("Example.COM").unwrap(), "example.com");
        assert_eq!(
            validator.validate_domain("https://sub.example.com/path?q=1").unwrap(),
            "sub.example.com"
        );
        assert!(validator.validate_domain("").is_err());
        assert!(validator.validate_domain("localhost").is_err());
        assert!(validator.validate_domain("-bad.example.com").is_err());
        assert!(validator.validate_domain("example.123").is_err());
        assert!(validator.validate_domain("printer.local").is_err());
    }

    #[test]
    fn test_blocked_domain_is_forbidden() {
        let validator = TargetValidator::new(vec!["Blocked.example".into()]);
        let err = validator.validate_domain("mail.blocked.example").unwrap_err();
        assert!(matches!(err, OsintError::Forbidden(_)));
        assert!(validator.validate_domain("notblocked.example").is_ok());
    }

    #[test]
    fn test_validate_ip() {
        let validator = TargetValidator::default();
        assert!(validator.validate_public_ip("8.8.8.8").is_ok());
        assert!(validator.validate_public_ip("2606:4700:4700::1111").is_ok());
        assert!(validator.validate_public_ip("10.0.0.1").is_err());
        assert!(validator.validate_public_ip("127.0.0.1").is_err());
        assert!(validator.validate_public_ip("fd00::1").is_err());
        assert!(validator.validate_public_ip("not-an-ip").is_err());
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("").is_err());
        assert!(validate_url("example.com").is_err());
        assert!(validate_url("ftp://example.com").is_err());
        assert!(validate_url("http://example.com").is_ok());
        assert!(validate_url("https://example.com/api").is_ok());
    }

    #[test]
    fn test_validate_public_url() {
        let validator = TargetValidator::default();
        let url = validator.validate_public_url("https://Example.com/about").unwrap();
        assert_eq!(url.host_str(), Some("example.com"));
        assert!(validator.validate_public_url("http://8.8.8.8/").is_ok());
        assert!(validator.validate_public_url("http://127.0.0.1:8080/admin").is_err());
        assert!(validator.validate_public_url("http://[::1]/").is_err());
        assert!(validator.validate_public_url("http://localhost/").is_err());
        assert!(validator.validate_public_url("ftp://example.com/").is_err());
    }
}
