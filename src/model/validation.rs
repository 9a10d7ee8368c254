//! Input validation for domain entities.
//!
//! # Responsibilities
//! - Hostname syntax (exact and single-label wildcard)
//! - Location path shape
//! - Access list rule consistency
//! - Security policy limits and intrusion-detection endpoint
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Runs in the handler layer before anything reaches the store

use thiserror::Error;

use crate::model::{AccessList, Certificate, ProxyHost, SecurityPolicy};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("at least one domain name is required")]
    NoDomains,

    #[error("invalid domain name '{0}'")]
    InvalidDomain(String),

    #[error("domain name '{0}' listed twice")]
    RepeatedDomain(String),

    #[error("invalid upstream: {0}")]
    InvalidUpstream(String),

    #[error("location path '{0}' must start with '/'")]
    InvalidLocationPath(String),

    #[error("location path '{0}' listed twice")]
    RepeatedLocation(String),

    #[error("access list '{0}' needs CIDR rules or local_network_only")]
    MissingCidrRules(String),

    #[error("access list '{0}' needs country codes")]
    MissingCountries(String),

    #[error("invalid country code '{0}'")]
    InvalidCountry(String),

    #[error("name must not be empty")]
    EmptyName,

    #[error("certificate material path must not be empty")]
    MissingMaterial,

    #[error("rate limit {0} must be greater than zero")]
    ZeroRateLimit(&'static str),

    #[error("intrusion detection api_url '{0}' must be an http(s) URL")]
    InvalidIntrusionUrl(String),

    #[error("intrusion detection api_key must not be empty")]
    MissingIntrusionKey,
}

/// Checks a hostname, allowing one leading `*.` wildcard label.
pub fn is_valid_domain_name(name: &str) -> bool {
    let bare = name.strip_prefix("*.").unwrap_or(name);
    if bare.is_empty() || bare.len() > 253 {
        return false;
    }
    let labels: Vec<&str> = bare.split('.').collect();
    if labels.len() < 2 && bare != "localhost" {
        return false;
    }
    labels.iter().all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    })
}

fn validate_domains(names: &[String], errors: &mut Vec<ModelError>) {
    if names.is_empty() {
        errors.push(ModelError::NoDomains);
    }
    let mut seen = std::collections::HashSet::new();
    for name in names {
        let lowered = name.to_ascii_lowercase();
        if !is_valid_domain_name(&lowered) {
            errors.push(ModelError::InvalidDomain(name.clone()));
        } else if !seen.insert(lowered) {
            errors.push(ModelError::RepeatedDomain(name.clone()));
        }
    }
}

pub fn validate_proxy_host(host: &ProxyHost) -> Result<(), Vec<ModelError>> {
    let mut errors = Vec::new();
    validate_domains(&host.domain_names, &mut errors);

    let upstreams = std::iter::once(&host.upstream).chain(host.locations.iter().map(|l| &l.upstream));
    for upstream in upstreams {
        if upstream.host.trim().is_empty() {
            errors.push(ModelError::InvalidUpstream("empty upstream host".to_string()));
        }
        if upstream.port == 0 {
            errors.push(ModelError::InvalidUpstream(format!("port 0 for {}", upstream.host)));
        }
    }

    let mut paths = std::collections::HashSet::new();
    for location in &host.locations {
        if !location.path.starts_with('/') {
            errors.push(ModelError::InvalidLocationPath(location.path.clone()));
        } else if !paths.insert(location.path.as_str()) {
            errors.push(ModelError::RepeatedLocation(location.path.clone()));
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

pub fn validate_access_list(list: &AccessList) -> Result<(), Vec<ModelError>> {
    let mut errors = Vec::new();
    if list.name.trim().is_empty() {
        errors.push(ModelError::EmptyName);
    }
    if list.kind.is_geo() {
        if list.countries.is_empty() {
            errors.push(ModelError::MissingCountries(list.name.clone()));
        }
        for code in &list.countries {
            if code.len() != 2 || !code.chars().all(|c| c.is_ascii_uppercase()) {
                errors.push(ModelError::InvalidCountry(code.clone()));
            }
        }
    } else if list.cidrs.is_empty() && !list.local_network_only {
        errors.push(ModelError::MissingCidrRules(list.name.clone()));
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

pub fn validate_certificate(cert: &Certificate) -> Result<(), Vec<ModelError>> {
    let mut errors = Vec::new();
    validate_domains(&cert.domain_names, &mut errors);
    if cert.certificate_path.trim().is_empty() || cert.key_path.trim().is_empty() {
        errors.push(ModelError::MissingMaterial);
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

pub fn validate_policy(policy: &SecurityPolicy) -> Result<(), Vec<ModelError>> {
    let mut errors = Vec::new();
    if policy.rate_limit_events == 0 {
        errors.push(ModelError::ZeroRateLimit("events"));
    }
    if policy.rate_limit_window_secs == 0 {
        errors.push(ModelError::ZeroRateLimit("window"));
    }
    if let Some(ids) = &policy.intrusion_detection {
        let web = url::Url::parse(&ids.api_url)
            .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
            .unwrap_or(false);
        if !web {
            errors.push(ModelError::InvalidIntrusionUrl(ids.api_url.clone()));
        }
        if ids.api_key.trim().is_empty() {
            errors.push(ModelError::MissingIntrusionKey);
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
