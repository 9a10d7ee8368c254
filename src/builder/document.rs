//! Engine-native structured configuration.
//!
//! The typed structs below cover the subset of the engine's JSON schema this
//! crate emits. Anything read back from the engine is kept as an untyped
//! [`Document`] because the engine adds defaults we do not model.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Root of the engine configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EngineConfig {
    pub apps: Apps,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Apps {
    pub http: HttpApp,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsApp>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crowdsec: Option<CrowdsecApp>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HttpApp {
    pub servers: BTreeMap<String, Server>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Server {
    pub listen: Vec<String>,

    pub routes: Vec<Route>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub protocols: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automatic_https: Option<AutomaticHttps>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tls_connection_policies: Vec<TlsConnectionPolicy>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AutomaticHttps {
    pub disable: bool,
}

/// One routing rule: all matcher sets are OR-ed, fields inside a set AND-ed.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Route {
    #[serde(rename = "match", default, skip_serializing_if = "Vec::is_empty")]
    pub matchers: Vec<MatcherSet>,

    pub handle: Vec<Handler>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub terminal: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct MatcherSet {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub host: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_ip: Option<RemoteIp>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxmind_geolocation: Option<GeoMatcher>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub not: Vec<MatcherSet>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RemoteIp {
    pub ranges: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GeoMatcher {
    pub db_path: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allow_countries: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deny_countries: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "handler", rename_all = "snake_case")]
pub enum Handler {
    Subroute {
        routes: Vec<Route>,
    },
    ReverseProxy {
        upstreams: Vec<UpstreamDial>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        transport: Option<Transport>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        headers: Option<ProxyHeaders>,
    },
    StaticResponse {
        status_code: u16,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        headers: BTreeMap<String, Vec<String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<String>,
    },
    Headers {
        response: HeaderOps,
    },
    Waf {
        load_owasp_crs: bool,
        directives: String,
    },
    RateLimit {
        rate_limits: BTreeMap<String, RateLimitZone>,
    },
    Crowdsec {},
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct UpstreamDial {
    pub dial: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Transport {
    pub protocol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProxyHeaders {
    pub request: HeaderOps,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct HeaderOps {
    pub set: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RateLimitZone {
    pub key: String,
    pub window: String,
    pub max_events: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TlsApp {
    pub certificates: TlsCertificates,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TlsCertificates {
    pub load_files: Vec<LoadFile>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoadFile {
    pub certificate: String,
    pub key: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TlsConnectionPolicy {
    #[serde(rename = "match")]
    pub matcher: SniMatcher,
    pub certificate_selection: CertificateSelection,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SniMatcher {
    pub sni: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CertificateSelection {
    pub any_tag: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CrowdsecApp {
    pub api_url: String,
    pub api_key: String,
}

/// Canonical structured configuration document.
///
/// Object keys are always sorted, so the compact text form (and therefore the
/// fingerprint) is stable for structurally equal documents.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Document(Value);

impl Document {
    pub fn from_value(value: Value) -> Self {
        Self(canonicalize(value))
    }

    /// Parse a JSON document as emitted by the engine.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Value>(text).map(Self::from_value)
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        // Only string-keyed maps and plain structs: serialization cannot fail.
        let value = serde_json::to_value(config).expect("engine config serializes to JSON");
        Self::from_value(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_null()
    }

    /// Human-readable text handed to the engine's adapt step.
    pub fn to_text(&self) -> String {
        format!("{:#}", self.0)
    }

    /// Hex SHA-256 of the compact canonical form.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.to_string().as_bytes());
        format!("{:x}", digest)
    }

    /// Short fingerprint for log lines.
    pub fn short_fingerprint(&self) -> String {
        self.fingerprint()[..12].to_string()
    }

    /// Total number of top-level routes across all HTTP servers.
    pub fn route_count(&self) -> usize {
        self.0
            .pointer("/apps/http/servers")
            .and_then(Value::as_object)
            .map(|servers| {
                servers
                    .values()
                    .filter_map(|s| s.get("routes").and_then(Value::as_array))
                    .map(Vec::len)
                    .sum()
            })
            .unwrap_or(0)
    }

    /// Host matchers of every top-level route, in route order.
    pub fn route_hosts(&self) -> Vec<Vec<String>> {
        let mut hosts = Vec::new();
        let Some(servers) = self.0.pointer("/apps/http/servers").and_then(Value::as_object) else {
            return hosts;
        };
        for server in servers.values() {
            let routes = server.get("routes").and_then(Value::as_array).into_iter().flatten();
            for route in routes {
                let names = route
                    .get("match")
                    .and_then(Value::as_array)
                    .into_iter()
                    .flatten()
                    .filter_map(|m| m.get("host").and_then(Value::as_array))
                    .flatten()
                    .filter_map(|h| h.as_str().map(str::to_string))
                    .collect();
                hosts.push(names);
            }
        }
        hosts
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(entries.into_iter().map(|(k, v)| (k, canonicalize(v))).collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}
