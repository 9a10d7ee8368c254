//! Access lists: CIDR or country based request filtering.

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

pub type AccessListId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessListKind {
    /// Only listed networks may connect.
    Allow,
    /// Listed networks are rejected.
    Deny,
    /// Only listed countries may connect.
    GeoAllow,
    /// Listed countries are rejected.
    GeoDeny,
}

impl AccessListKind {
    pub fn is_geo(self) -> bool {
        matches!(self, AccessListKind::GeoAllow | AccessListKind::GeoDeny)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AccessList {
    #[serde(default)]
    pub id: AccessListId,

    pub name: String,

    pub kind: AccessListKind,

    #[serde(default)]
    pub cidrs: Vec<IpNet>,

    /// ISO 3166-1 alpha-2 codes, uppercase.
    #[serde(default)]
    pub countries: Vec<String>,

    /// Restrict access to loopback and private ranges.
    #[serde(default)]
    pub local_network_only: bool,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Loopback, RFC 1918 and unique-local ranges.
pub fn local_networks() -> Vec<IpNet> {
    ["127.0.0.0/8", "10.0.0.0/8", "172.16.0.0/12", "192.168.0.0/16", "::1/128", "fc00::/7"]
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect()
}
