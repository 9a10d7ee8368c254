//! Snapshot → document composition.
//!
//! # Responsibilities
//! - Drop hosts that cannot be served (disabled, no domains, duplicates,
//!   certificate or access list problems) and explain why
//! - Order routes so exact domains win over wildcards, including exact
//!   names listed next to a wildcard on the same host
//! - Compose each host's handler chain in a fixed order:
//!   TLS redirect → exploit block → access control → security modules
//!   → location overrides → default upstream

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use ipnet::IpNet;
use serde_json::Map;

use crate::builder::document::*;
use crate::builder::warnings::{BuildWarning, WarningKind};
use crate::config::BuildConfig;
use crate::model::access_list::local_networks;
use crate::model::{
    AccessList, AccessListKind, Certificate, DesiredState, HostFeatures, PolicyMode, ProxyHost,
    SecurityPolicy, Upstream, UpstreamScheme,
};

const HSTS_MAX_AGE: u32 = 31_536_000;

/// Result of one build.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub document: Document,
    pub warnings: Vec<BuildWarning>,
}

/// A host that survived filtering, with its resolved references.
struct AcceptedHost<'a> {
    host: &'a ProxyHost,
    domains: Vec<String>,
    certificate: Option<&'a Certificate>,
    access_list: Option<&'a AccessList>,
}

impl AcceptedHost<'_> {
    /// Sort key: exact-only hosts first, then more labels first, then id.
    fn specificity(&self) -> (bool, Reverse<usize>, u64) {
        let least_labels = self
            .domains
            .iter()
            .map(|d| d.split('.').count())
            .min()
            .unwrap_or(0);
        (self.host.has_wildcard(), Reverse(least_labels), self.host.id)
    }

    /// The first of this host's wildcards that matches `name`.
    fn wildcard_for(&self, name: &str) -> Option<&str> {
        self.domains
            .iter()
            .find(|w| wildcard_matches(w, name))
            .map(String::as_str)
    }

    /// Whether one of this host's wildcards would capture an exact domain of `other`.
    fn captures(&self, other: &AcceptedHost<'_>) -> bool {
        other.domains.iter().any(|d| self.wildcard_for(d).is_some())
    }

    fn terminates_tls(&self) -> bool {
        self.certificate.is_some()
    }
}

/// Whether the single-label wildcard `pattern` matches the exact name `name`.
fn wildcard_matches(pattern: &str, name: &str) -> bool {
    if name.starts_with("*.") {
        return false;
    }
    match (pattern.strip_prefix("*."), name.split_once('.')) {
        (Some(suffix), Some((label, rest))) => !label.is_empty() && rest == suffix,
        _ => false,
    }
}

/// Orders accepted hosts into routes.
///
/// Starts from specificity order, then holds back any host whose wildcard
/// would capture an exact domain of a host still waiting. When hosts capture
/// each other, the earlier one goes first and the later one loses the
/// captured names.
fn order_routes<'a>(
    mut pending: Vec<AcceptedHost<'a>>,
    warnings: &mut Vec<BuildWarning>,
) -> Vec<AcceptedHost<'a>> {
    pending.sort_by_key(AcceptedHost::specificity);

    let mut ordered: Vec<AcceptedHost<'a>> = Vec::with_capacity(pending.len());
    while !pending.is_empty() {
        let next = (0..pending.len())
            .find(|&i| {
                pending
                    .iter()
                    .enumerate()
                    .all(|(j, other)| i == j || !pending[i].captures(other))
            })
            .unwrap_or(0);
        let mut host = pending.remove(next);

        let shadowed: Vec<(String, WarningKind)> = host
            .domains
            .iter()
            .filter_map(|d| {
                ordered.iter().find_map(|earlier| {
                    earlier.wildcard_for(d).map(|w| {
                        let kind = WarningKind::ShadowedDomain {
                            domain: d.clone(),
                            wildcard: w.to_string(),
                            owner: earlier.host.id,
                        };
                        (d.clone(), kind)
                    })
                })
            })
            .collect();
        for (domain, kind) in shadowed {
            warnings.push(BuildWarning::degraded(host.host.id, &host.domains, kind));
            host.domains.retain(|d| *d != domain);
        }
        ordered.push(host);
    }
    ordered
}

/// Builds engine documents from desired-state snapshots.
#[derive(Debug, Clone)]
pub struct Builder {
    config: BuildConfig,
}

impl Builder {
    pub fn new(config: BuildConfig) -> Self {
        Self { config }
    }

    pub fn build(&self, state: &DesiredState) -> BuildOutput {
        let mut warnings = Vec::new();
        let accepted = self.accept_hosts(state, &mut warnings);
        let accepted = order_routes(accepted, &mut warnings);

        let routes = accepted
            .iter()
            .map(|a| self.host_route(a, &state.policy))
            .collect();

        let http2 = accepted.iter().any(|a| a.host.features.http2);
        let server = Server {
            listen: self.config.listen.clone(),
            routes,
            protocols: if http2 {
                vec!["h1".to_string(), "h2".to_string()]
            } else {
                vec!["h1".to_string()]
            },
            automatic_https: Some(AutomaticHttps { disable: true }),
            tls_connection_policies: tls_policies(&accepted),
        };

        let mut servers = BTreeMap::new();
        servers.insert(self.config.server_name.clone(), server);

        let config = EngineConfig {
            apps: Apps {
                http: HttpApp { servers },
                tls: tls_app(&accepted),
                crowdsec: state.policy.intrusion_detection.as_ref().map(|ids| CrowdsecApp {
                    api_url: ids.api_url.clone(),
                    api_key: ids.api_key.clone(),
                }),
            },
        };

        BuildOutput {
            document: Document::from_config(&config),
            warnings,
        }
    }

    fn accept_hosts<'a>(
        &self,
        state: &'a DesiredState,
        warnings: &mut Vec<BuildWarning>,
    ) -> Vec<AcceptedHost<'a>> {
        let mut hosts: Vec<&ProxyHost> = state.hosts.iter().collect();
        hosts.sort_by_key(|h| h.id);

        let mut claimed: HashMap<String, u64> = HashMap::new();
        let mut accepted = Vec::new();

        for host in hosts {
            let mut domains: Vec<String> = Vec::new();
            for name in &host.domain_names {
                let name = name.trim().to_ascii_lowercase();
                if !name.is_empty() && !domains.contains(&name) {
                    domains.push(name);
                }
            }

            if !host.enabled {
                warnings.push(BuildWarning::excluded(host.id, &domains, WarningKind::Disabled));
                continue;
            }
            if domains.is_empty() {
                warnings.push(BuildWarning::excluded(host.id, &domains, WarningKind::NoDomains));
                continue;
            }
            if let Some((domain, owner)) = domains
                .iter()
                .find_map(|d| claimed.get(d).map(|owner| (d.clone(), *owner)))
            {
                warnings.push(BuildWarning::excluded(
                    host.id,
                    &domains,
                    WarningKind::DuplicateDomain { domain, owner },
                ));
                continue;
            }

            let certificate = match resolve_certificate(host, &domains, state, warnings) {
                Ok(cert) => cert,
                Err(warning) => {
                    warnings.push(warning);
                    continue;
                }
            };

            let access_list = match host.access_list_id {
                None => None,
                Some(id) => match state.access_list(id) {
                    None => {
                        warnings.push(BuildWarning::excluded(
                            host.id,
                            &domains,
                            WarningKind::MissingAccessList { access_list_id: id },
                        ));
                        continue;
                    }
                    Some(list) if !list.enabled => None,
                    Some(list) => {
                        if list.kind.is_geo() && self.config.geoip_db_path.is_none() {
                            warnings.push(BuildWarning::excluded(
                                host.id,
                                &domains,
                                WarningKind::GeoDatabaseMissing { access_list_id: id },
                            ));
                            continue;
                        }
                        Some(list)
                    }
                },
            };

            for domain in &domains {
                claimed.insert(domain.clone(), host.id);
            }
            accepted.push(AcceptedHost { host, domains, certificate, access_list });
        }

        accepted
    }

    fn host_route(&self, accepted: &AcceptedHost<'_>, policy: &SecurityPolicy) -> Route {
        let host = accepted.host;
        let features = &host.features;
        let mut inner = Vec::new();

        if features.force_tls && accepted.terminates_tls() {
            inner.push(https_redirect());
        }

        if features.block_exploits && !self.config.exploit_paths.is_empty() {
            inner.push(Route {
                matchers: vec![MatcherSet {
                    path: self.config.exploit_paths.clone(),
                    ..Default::default()
                }],
                handle: vec![forbidden()],
                ..Default::default()
            });
        }

        if policy.acl == PolicyMode::Enforce {
            if let Some(list) = accepted.access_list {
                inner.extend(self.access_routes(list));
            }
        }

        if let Some(route) = security_route(policy) {
            inner.push(route);
        }

        let mut locations: Vec<_> = host.locations.iter().collect();
        locations.sort_by(|a, b| b.path.len().cmp(&a.path.len()).then_with(|| a.path.cmp(&b.path)));
        for location in locations {
            inner.push(Route {
                matchers: vec![MatcherSet {
                    path: path_patterns(&location.path),
                    ..Default::default()
                }],
                handle: vec![reverse_proxy(&location.upstream, features)],
                terminal: true,
            });
        }

        inner.push(Route {
            handle: vec![reverse_proxy(&host.upstream, features)],
            ..Default::default()
        });

        let mut handle = Vec::new();
        if features.hsts && accepted.terminates_tls() {
            let mut value = format!("max-age={}", HSTS_MAX_AGE);
            if features.hsts_subdomains {
                value.push_str("; includeSubDomains");
            }
            let mut set = BTreeMap::new();
            set.insert("Strict-Transport-Security".to_string(), vec![value]);
            handle.push(Handler::Headers { response: HeaderOps { set } });
        }
        handle.push(Handler::Subroute { routes: inner });

        Route {
            matchers: vec![MatcherSet {
                host: accepted.domains.clone(),
                ..Default::default()
            }],
            handle,
            terminal: true,
        }
    }

    /// Routes that answer 403 for clients the access list rejects.
    fn access_routes(&self, list: &AccessList) -> Vec<Route> {
        let mut routes = Vec::new();

        match list.kind {
            AccessListKind::Allow => {
                let mut allowed = list.cidrs.clone();
                if list.local_network_only {
                    allowed.extend(local_networks());
                }
                routes.push(block_unless(MatcherSet {
                    remote_ip: Some(ranges(&allowed)),
                    ..Default::default()
                }));
                return routes;
            }
            AccessListKind::Deny => {
                if !list.cidrs.is_empty() {
                    routes.push(Route {
                        matchers: vec![MatcherSet {
                            remote_ip: Some(ranges(&list.cidrs)),
                            ..Default::default()
                        }],
                        handle: vec![forbidden()],
                        ..Default::default()
                    });
                }
            }
            AccessListKind::GeoAllow | AccessListKind::GeoDeny => {
                let db_path = self.config.geoip_db_path.clone().unwrap_or_default();
                let geo = if list.kind == AccessListKind::GeoAllow {
                    GeoMatcher { db_path, allow_countries: list.countries.clone(), deny_countries: vec![] }
                } else {
                    GeoMatcher { db_path, allow_countries: vec![], deny_countries: list.countries.clone() }
                };
                // The geolocation matcher matches permitted clients for both kinds.
                routes.push(block_unless(MatcherSet {
                    maxmind_geolocation: Some(geo),
                    ..Default::default()
                }));
            }
        }

        if list.local_network_only {
            routes.push(block_unless(MatcherSet {
                remote_ip: Some(ranges(&local_networks())),
                ..Default::default()
            }));
        }
        routes
    }
}

/// Returns the usable certificate, `Ok(None)` for plain HTTP, or the warning
/// that excludes the host.
fn resolve_certificate<'a>(
    host: &ProxyHost,
    domains: &[String],
    state: &'a DesiredState,
    warnings: &mut Vec<BuildWarning>,
) -> Result<Option<&'a Certificate>, BuildWarning> {
    let forced = host.features.force_tls;
    let problem = match host.certificate_id {
        None if forced => WarningKind::MissingCertificate { certificate_id: None },
        None => return Ok(None),
        Some(id) => match state.certificate(id) {
            None => WarningKind::MissingCertificate { certificate_id: Some(id) },
            Some(cert) if cert.is_expired(state.taken_at) => WarningKind::ExpiredCertificate {
                certificate_id: id,
                expired_at: cert.expires_at,
            },
            Some(cert) => match domains.iter().find(|d| !cert.covers(d)) {
                Some(domain) => WarningKind::CertificateMismatch {
                    certificate_id: id,
                    domain: domain.clone(),
                },
                None => return Ok(Some(cert)),
            },
        },
    };

    if forced {
        Err(BuildWarning::excluded(host.id, domains, problem))
    } else {
        warnings.push(BuildWarning::degraded(host.id, domains, problem));
        Ok(None)
    }
}

fn security_route(policy: &SecurityPolicy) -> Option<Route> {
    let mut handle = Vec::new();

    if policy.intrusion_detection.is_some() {
        handle.push(Handler::Crowdsec {});
    }

    let engine = match policy.waf {
        PolicyMode::Disabled => None,
        PolicyMode::Monitor => Some("DetectionOnly"),
        PolicyMode::Enforce => Some("On"),
    };
    if let Some(engine) = engine {
        handle.push(Handler::Waf {
            load_owasp_crs: true,
            directives: format!("SecRuleEngine {}", engine),
        });
    }

    if policy.rate_limit == PolicyMode::Enforce {
        let mut zones = BTreeMap::new();
        zones.insert(
            "per_client".to_string(),
            RateLimitZone {
                key: "{http.request.remote.host}".to_string(),
                window: format!("{}s", policy.rate_limit_window_secs),
                max_events: policy.rate_limit_events,
            },
        );
        handle.push(Handler::RateLimit { rate_limits: zones });
    }

    if handle.is_empty() {
        None
    } else {
        Some(Route { handle, ..Default::default() })
    }
}

fn reverse_proxy(upstream: &Upstream, features: &HostFeatures) -> Handler {
    let transport = (upstream.scheme == UpstreamScheme::Https).then(|| Transport {
        protocol: "http".to_string(),
        tls: Some(Map::new()),
    });

    let headers = features.websocket.then(|| {
        let mut set = BTreeMap::new();
        set.insert("Connection".to_string(), vec!["{http.request.header.Connection}".to_string()]);
        set.insert("Upgrade".to_string(), vec!["{http.request.header.Upgrade}".to_string()]);
        ProxyHeaders { request: HeaderOps { set } }
    });

    Handler::ReverseProxy {
        upstreams: vec![UpstreamDial { dial: upstream.dial() }],
        transport,
        headers,
    }
}

fn https_redirect() -> Route {
    let mut headers = BTreeMap::new();
    headers.insert(
        "Location".to_string(),
        vec!["https://{http.request.host}{http.request.uri}".to_string()],
    );
    Route {
        matchers: vec![MatcherSet {
            protocol: Some("http".to_string()),
            ..Default::default()
        }],
        handle: vec![Handler::StaticResponse { status_code: 308, headers, body: None }],
        terminal: true,
    }
}

fn ranges(nets: &[IpNet]) -> RemoteIp {
    RemoteIp {
        ranges: nets.iter().map(ToString::to_string).collect(),
    }
}

fn forbidden() -> Handler {
    Handler::StaticResponse {
        status_code: 403,
        headers: BTreeMap::new(),
        body: Some("Forbidden".to_string()),
    }
}

/// 403 for every request that does not match `allowed`.
fn block_unless(allowed: MatcherSet) -> Route {
    Route {
        matchers: vec![MatcherSet { not: vec![allowed], ..Default::default() }],
        handle: vec![forbidden()],
        ..Default::default()
    }
}

fn path_patterns(path: &str) -> Vec<String> {
    let base = path.trim_end_matches('/');
    if base.is_empty() {
        vec!["/*".to_string()]
    } else {
        vec![base.to_string(), format!("{}/*", base)]
    }
}

fn certificate_tag(cert: &Certificate) -> String {
    format!("hostplane-cert-{}", cert.id)
}

fn tls_app(accepted: &[AcceptedHost<'_>]) -> Option<TlsApp> {
    let mut certs: BTreeMap<u64, &Certificate> = BTreeMap::new();
    for a in accepted {
        if let Some(cert) = a.certificate {
            certs.insert(cert.id, cert);
        }
    }
    if certs.is_empty() {
        return None;
    }
    let load_files = certs
        .values()
        .map(|cert| LoadFile {
            certificate: cert.certificate_path.clone(),
            key: cert.key_path.clone(),
            tags: vec![certificate_tag(cert)],
        })
        .collect();
    Some(TlsApp { certificates: TlsCertificates { load_files } })
}

fn tls_policies(accepted: &[AcceptedHost<'_>]) -> Vec<TlsConnectionPolicy> {
    let mut by_cert: BTreeMap<u64, (&Certificate, BTreeSet<String>)> = BTreeMap::new();
    for a in accepted {
        if let Some(cert) = a.certificate {
            by_cert
                .entry(cert.id)
                .or_insert_with(|| (cert, BTreeSet::new()))
                .1
                .extend(a.domains.iter().cloned());
        }
    }
    by_cert
        .into_values()
        .map(|(cert, sni)| TlsConnectionPolicy {
            matcher: SniMatcher { sni: sni.into_iter().collect() },
            certificate_selection: CertificateSelection { any_tag: vec![certificate_tag(cert)] },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Location, IntrusionDetection};
    use chrono::{Duration, Utc};
    use serde_json::{json, Value};

    fn builder() -> Builder {
        Builder::new(BuildConfig::default())
    }

    fn state(hosts: Vec<ProxyHost>) -> DesiredState {
        DesiredState { hosts, taken_at: Utc::now(), ..Default::default() }
    }

    fn host(id: u64, domains: &[&str], port: u16) -> ProxyHost {
        ProxyHost::new(id, domains.iter().map(|d| d.to_string()).collect(), Upstream::new("localhost", port))
    }

    fn cert(id: u64, domains: &[&str], days: i64) -> Certificate {
        Certificate {
            id,
            domain_names: domains.iter().map(|d| d.to_string()).collect(),
            certificate_path: format!("/certs/{}.pem", id),
            key_path: format!("/certs/{}.key", id),
            expires_at: Utc::now() + Duration::days(days),
        }
    }

    fn routes(doc: &Document) -> Vec<Value> {
        doc.as_value()
            .pointer("/apps/http/servers/srv0/routes")
            .and_then(Value::as_array)
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_single_host_document_shape() {
        let out = builder().build(&state(vec![host(1, &["example.com"], 8080)]));
        assert!(out.warnings.is_empty());

        let routes = routes(&out.document);
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0]["match"], json!([{"host": ["example.com"]}]));
        assert_eq!(routes[0]["terminal"], json!(true));

        let sub = &routes[0]["handle"][0];
        assert_eq!(sub["handler"], "subroute");
        let last = sub["routes"].as_array().unwrap().last().unwrap();
        assert_eq!(
            last["handle"][0],
            json!({"handler": "reverse_proxy", "upstreams": [{"dial": "localhost:8080"}]})
        );
        assert!(out.document.as_value().pointer("/apps/tls").is_none());
    }

    #[test]
    fn test_build_is_deterministic() {
        let mut hosts = vec![
            host(3, &["*.example.com"], 1),
            host(1, &["b.example.com", "a.example.com"], 2),
            host(2, &["c.example.org"], 3),
        ];
        let a = builder().build(&state(hosts.clone()));
        hosts.reverse();
        let b = builder().build(&state(hosts));
        assert_eq!(a.document, b.document);
        assert_eq!(a.document.fingerprint(), b.document.fingerprint());
    }

    #[test]
    fn test_exact_domains_ordered_before_wildcards() {
        let out = builder().build(&state(vec![
            host(1, &["*.example.com"], 1),
            host(2, &["*.api.example.com"], 2),
            host(3, &["shop.example.com"], 3),
        ]));
        let hosts = out.document.route_hosts();
        assert_eq!(
            hosts,
            vec![
                vec!["shop.example.com".to_string()],
                vec!["*.api.example.com".to_string()],
                vec!["*.example.com".to_string()],
            ]
        );
    }

    #[test]
    fn test_exact_name_beside_wildcard_is_not_captured() {
        let out = builder().build(&state(vec![
            host(1, &["*.example.com", "foo.bar.example.com"], 1),
            host(2, &["*.bar.example.com"], 2),
        ]));
        assert!(out.warnings.is_empty());
        assert_eq!(
            out.document.route_hosts(),
            vec![
                vec!["*.example.com".to_string(), "foo.bar.example.com".to_string()],
                vec!["*.bar.example.com".to_string()],
            ]
        );
    }

    #[test]
    fn test_mutually_captured_names_are_dropped_from_later_host() {
        let out = builder().build(&state(vec![
            host(1, &["a.x.com", "*.y.com"], 1),
            host(2, &["b.y.com", "*.x.com"], 2),
        ]));
        assert_eq!(
            out.document.route_hosts(),
            vec![
                vec!["a.x.com".to_string(), "*.y.com".to_string()],
                vec!["*.x.com".to_string()],
            ]
        );
        assert_eq!(out.warnings.len(), 1);
        assert!(!out.warnings[0].excluded);
        assert_eq!(out.warnings[0].host_id, 2);
        assert_eq!(
            out.warnings[0].kind,
            WarningKind::ShadowedDomain { domain: "b.y.com".into(), wildcard: "*.y.com".into(), owner: 1 }
        );
    }

    #[test]
    fn test_wildcard_matches_one_label() {
        assert!(wildcard_matches("*.example.com", "a.example.com"));
        assert!(!wildcard_matches("*.example.com", "a.b.example.com"));
        assert!(!wildcard_matches("*.example.com", "example.com"));
        assert!(!wildcard_matches("*.example.com", "*.example.com"));
        assert!(!wildcard_matches("a.example.com", "a.example.com"));
    }

    #[test]
    fn test_duplicate_domain_excludes_later_host() {
        let out = builder().build(&state(vec![
            host(2, &["Example.com"], 2),
            host(1, &["example.com", "www.example.com"], 1),
        ]));
        assert_eq!(out.document.route_count(), 1);
        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.warnings[0].host_id, 2);
        assert_eq!(
            out.warnings[0].kind,
            WarningKind::DuplicateDomain { domain: "example.com".into(), owner: 1 }
        );
    }

    #[test]
    fn test_disabled_and_empty_hosts_are_reported() {
        let mut disabled = host(1, &["a.com"], 1);
        disabled.enabled = false;
        let out = builder().build(&state(vec![disabled, host(2, &[], 2)]));
        assert_eq!(out.document.route_count(), 0);
        let kinds: Vec<_> = out.warnings.iter().map(|w| w.kind.clone()).collect();
        assert_eq!(kinds, vec![WarningKind::Disabled, WarningKind::NoDomains]);
    }

    #[test]
    fn test_forced_tls_without_certificate_is_excluded() {
        let mut h = host(7, &["example.com"], 8080);
        h.features.force_tls = true;
        let out = builder().build(&state(vec![h]));
        assert_eq!(out.document.route_count(), 0);
        assert_eq!(out.warnings.len(), 1);
        assert!(out.warnings[0].excluded);
        assert_eq!(out.warnings[0].host_id, 7);
        assert!(out.warnings[0].to_string().contains("example.com"));
    }

    #[test]
    fn test_expired_certificate_degrades_unforced_host() {
        let mut h = host(1, &["example.com"], 8080);
        h.certificate_id = Some(5);
        let mut s = state(vec![h]);
        s.certificates.insert(5, cert(5, &["example.com"], -1));
        let out = builder().build(&s);
        assert_eq!(out.document.route_count(), 1);
        assert!(!out.warnings[0].excluded);
        assert!(matches!(out.warnings[0].kind, WarningKind::ExpiredCertificate { certificate_id: 5, .. }));
        assert!(out.document.as_value().pointer("/apps/tls").is_none());
    }

    #[test]
    fn test_tls_host_gets_redirect_hsts_and_certificate() {
        let mut h = host(1, &["example.com", "www.example.com"], 8080);
        h.features.force_tls = true;
        h.features.hsts = true;
        h.features.hsts_subdomains = true;
        h.certificate_id = Some(9);
        let mut s = state(vec![h]);
        s.certificates.insert(9, cert(9, &["example.com", "*.example.com"], 30));

        let out = builder().build(&s);
        assert!(out.warnings.is_empty());
        let doc = out.document.as_value();
        assert_eq!(
            doc.pointer("/apps/tls/certificates/load_files/0/tags"),
            Some(&json!(["hostplane-cert-9"]))
        );
        assert_eq!(
            doc.pointer("/apps/http/servers/srv0/tls_connection_policies/0/match/sni"),
            Some(&json!(["example.com", "www.example.com"]))
        );

        let route = &routes(&out.document)[0];
        assert_eq!(
            route["handle"][0]["response"]["set"]["Strict-Transport-Security"],
            json!(["max-age=31536000; includeSubDomains"])
        );
        let first_inner = &route["handle"][1]["routes"][0];
        assert_eq!(first_inner["match"], json!([{"protocol": "http"}]));
        assert_eq!(first_inner["handle"][0]["status_code"], json!(308));
    }

    #[test]
    fn test_handler_chain_order() {
        let mut h = host(1, &["example.com"], 8080);
        h.access_list_id = Some(4);
        h.locations.push(Location { path: "/api".into(), upstream: Upstream::new("api", 9000) });
        h.locations.push(Location { path: "/api/v2/".into(), upstream: Upstream::new("api2", 9001) });
        let mut s = state(vec![h]);
        s.access_lists.insert(4, AccessList {
            id: 4,
            name: "office".into(),
            kind: AccessListKind::Allow,
            cidrs: vec!["203.0.113.0/24".parse().unwrap()],
            countries: vec![],
            local_network_only: false,
            enabled: true,
        });
        s.policy.waf = PolicyMode::Enforce;
        s.policy.rate_limit = PolicyMode::Enforce;

        let out = builder().build(&s);
        let inner = routes(&out.document)[0]["handle"][0]["routes"].as_array().cloned().unwrap();
        assert_eq!(inner.len(), 5);
        assert_eq!(inner[0]["match"][0]["not"][0]["remote_ip"]["ranges"], json!(["203.0.113.0/24"]));
        assert_eq!(inner[1]["handle"][0]["handler"], "waf");
        assert_eq!(inner[1]["handle"][1]["handler"], "rate_limit");
        assert_eq!(inner[2]["match"][0]["path"], json!(["/api/v2", "/api/v2/*"]));
        assert_eq!(inner[3]["match"][0]["path"], json!(["/api", "/api/*"]));
        assert_eq!(inner[4]["handle"][0]["upstreams"][0]["dial"], "localhost:8080");
    }

    #[test]
    fn test_acl_monitor_mode_does_not_block() {
        let mut h = host(1, &["example.com"], 8080);
        h.access_list_id = Some(4);
        let mut s = state(vec![h]);
        s.access_lists.insert(4, AccessList {
            id: 4,
            name: "lan".into(),
            kind: AccessListKind::Deny,
            cidrs: vec!["198.51.100.0/24".parse().unwrap()],
            countries: vec![],
            local_network_only: false,
            enabled: true,
        });
        s.policy.acl = PolicyMode::Monitor;
        let out = builder().build(&s);
        let inner = routes(&out.document)[0]["handle"][0]["routes"].as_array().cloned().unwrap();
        assert_eq!(inner.len(), 1);
    }

    #[test]
    fn test_missing_access_list_excludes_host() {
        let mut h = host(1, &["example.com"], 8080);
        h.access_list_id = Some(42);
        let out = builder().build(&state(vec![h]));
        assert_eq!(out.document.route_count(), 0);
        assert_eq!(out.warnings[0].kind, WarningKind::MissingAccessList { access_list_id: 42 });
    }

    #[test]
    fn test_geo_list_requires_database() {
        let mut h = host(1, &["example.com"], 8080);
        h.access_list_id = Some(2);
        let mut s = state(vec![h]);
        s.access_lists.insert(2, AccessList {
            id: 2,
            name: "eu".into(),
            kind: AccessListKind::GeoAllow,
            cidrs: vec![],
            countries: vec!["DE".into(), "FR".into()],
            local_network_only: false,
            enabled: true,
        });
        let out = builder().build(&s);
        assert_eq!(out.warnings[0].kind, WarningKind::GeoDatabaseMissing { access_list_id: 2 });

        let mut config = BuildConfig::default();
        config.geoip_db_path = Some("/geo/country.mmdb".into());
        let out = Builder::new(config).build(&s);
        assert!(out.warnings.is_empty());
        let inner = &routes(&out.document)[0]["handle"][0]["routes"][0];
        assert_eq!(
            inner["match"][0]["not"][0]["maxmind_geolocation"],
            json!({"db_path": "/geo/country.mmdb", "allow_countries": ["DE", "FR"]})
        );
    }

    #[test]
    fn test_websocket_https_upstream_and_intrusion_detection() {
        let mut h = host(1, &["example.com"], 8443);
        h.upstream.scheme = UpstreamScheme::Https;
        h.features.websocket = true;
        h.features.http2 = true;
        let mut s = state(vec![h]);
        s.policy.intrusion_detection = Some(IntrusionDetection {
            api_url: "http://crowdsec:8080".into(),
            api_key: "k".into(),
        });

        let out = builder().build(&s);
        let doc = out.document.as_value();
        assert_eq!(doc.pointer("/apps/crowdsec/api_url"), Some(&json!("http://crowdsec:8080")));
        assert_eq!(doc.pointer("/apps/http/servers/srv0/protocols"), Some(&json!(["h1", "h2"])));

        let inner = routes(&out.document)[0]["handle"][0]["routes"].as_array().cloned().unwrap();
        assert_eq!(inner[0]["handle"][0]["handler"], "crowdsec");
        let proxy = &inner[1]["handle"][0];
        assert_eq!(proxy["transport"], json!({"protocol": "http", "tls": {}}));
        assert_eq!(proxy["headers"]["request"]["set"]["Upgrade"], json!(["{http.request.header.Upgrade}"]));
    }

    #[test]
    fn test_empty_snapshot_still_has_server() {
        let out = builder().build(&DesiredState::default());
        assert_eq!(
            out.document.as_value().pointer("/apps/http/servers/srv0/routes"),
            Some(&json!([]))
        );
    }
}
