//! Proxy host definitions.

use serde::{Deserialize, Serialize};

use crate::model::access_list::AccessListId;
use crate::model::certificate::CertificateId;

pub type HostId = u64;

/// Scheme used to reach an upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpstreamScheme {
    #[default]
    Http,
    Https,
}

/// Upstream target for a host or location.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Upstream {
    #[serde(default)]
    pub scheme: UpstreamScheme,
    pub host: String,
    pub port: u16,
}

impl Upstream {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme: UpstreamScheme::Http,
            host: host.into(),
            port,
        }
    }

    /// Dial address in `host:port` form. IPv6 literals are bracketed.
    pub fn dial(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Optional per-host feature flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HostFeatures {
    /// Redirect plain HTTP to HTTPS and require a certificate.
    pub force_tls: bool,

    /// Pass `Upgrade`/`Connection` headers through to the upstream.
    pub websocket: bool,

    /// Offer HTTP/2 to clients.
    pub http2: bool,

    /// Send `Strict-Transport-Security`.
    pub hsts: bool,

    /// Add `includeSubDomains` to the HSTS header.
    pub hsts_subdomains: bool,

    /// Reject well-known exploit probe paths.
    pub block_exploits: bool,
}

/// Path-scoped upstream override.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Location {
    /// Path prefix, always starting with `/`.
    pub path: String,
    pub upstream: Upstream,
}

/// A user-declared virtual host.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProxyHost {
    #[serde(default)]
    pub id: HostId,

    pub domain_names: Vec<String>,

    pub upstream: Upstream,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub features: HostFeatures,

    #[serde(default)]
    pub locations: Vec<Location>,

    #[serde(default)]
    pub certificate_id: Option<CertificateId>,

    #[serde(default)]
    pub access_list_id: Option<AccessListId>,
}

fn default_enabled() -> bool {
    true
}

impl ProxyHost {
    pub fn new(id: HostId, domain_names: Vec<String>, upstream: Upstream) -> Self {
        Self {
            id,
            domain_names,
            upstream,
            enabled: true,
            features: HostFeatures::default(),
            locations: Vec::new(),
            certificate_id: None,
            access_list_id: None,
        }
    }

    /// Lowercase domain names in place.
    pub fn normalize(&mut self) {
        for name in &mut self.domain_names {
            *name = name.trim().to_ascii_lowercase();
        }
    }

    pub fn has_wildcard(&self) -> bool {
        self.domain_names.iter().any(|d| d.starts_with("*."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dial_address() {
        assert_eq!(Upstream::new("localhost", 8080).dial(), "localhost:8080");
        assert_eq!(Upstream::new("::1", 3000).dial(), "[::1]:3000");
    }

    #[test]
    fn test_deserialize_minimal_host() {
        let host: ProxyHost = serde_json::from_str(
            r#"{"domain_names":["Example.com"],"upstream":{"host":"localhost","port":8080}}"#,
        )
        .unwrap();
        assert!(host.enabled);
        assert_eq!(host.upstream.scheme, UpstreamScheme::Http);
        assert!(!host.features.force_tls);

        let mut host = host;
        host.normalize();
        assert_eq!(host.domain_names, vec!["example.com"]);
    }
}
