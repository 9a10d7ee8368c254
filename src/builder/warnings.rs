//! Non-fatal build findings.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{AccessListId, CertificateId, HostId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WarningKind {
    Disabled,
    NoDomains,
    DuplicateDomain { domain: String, owner: HostId },
    MissingCertificate { certificate_id: Option<CertificateId> },
    ExpiredCertificate { certificate_id: CertificateId, expired_at: DateTime<Utc> },
    CertificateMismatch { certificate_id: CertificateId, domain: String },
    MissingAccessList { access_list_id: AccessListId },
    GeoDatabaseMissing { access_list_id: AccessListId },
    ShadowedDomain { domain: String, wildcard: String, owner: HostId },
}

/// A host (or one of its features) left out of the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildWarning {
    pub host_id: HostId,
    pub domains: Vec<String>,
    /// Whether the whole host was omitted, as opposed to a degraded feature.
    pub excluded: bool,
    #[serde(flatten)]
    pub kind: WarningKind,
}

impl BuildWarning {
    pub fn excluded(host_id: HostId, domains: &[String], kind: WarningKind) -> Self {
        Self { host_id, domains: domains.to_vec(), excluded: true, kind }
    }

    pub fn degraded(host_id: HostId, domains: &[String], kind: WarningKind) -> Self {
        Self { host_id, domains: domains.to_vec(), excluded: false, kind }
    }
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarningKind::Disabled => write!(f, "host is disabled"),
            WarningKind::NoDomains => write!(f, "host has no domain names"),
            WarningKind::DuplicateDomain { domain, owner } => {
                write!(f, "domain {} already served by host {}", domain, owner)
            }
            WarningKind::MissingCertificate { certificate_id: Some(id) } => {
                write!(f, "certificate {} does not exist", id)
            }
            WarningKind::MissingCertificate { certificate_id: None } => {
                write!(f, "TLS is forced but no certificate is assigned")
            }
            WarningKind::ExpiredCertificate { certificate_id, expired_at } => {
                write!(f, "certificate {} expired at {}", certificate_id, expired_at.to_rfc3339())
            }
            WarningKind::CertificateMismatch { certificate_id, domain } => {
                write!(f, "certificate {} does not cover {}", certificate_id, domain)
            }
            WarningKind::MissingAccessList { access_list_id } => {
                write!(f, "access list {} does not exist", access_list_id)
            }
            WarningKind::GeoDatabaseMissing { access_list_id } => {
                write!(f, "access list {} needs a GeoIP database but none is configured", access_list_id)
            }
            WarningKind::ShadowedDomain { domain, wildcard, owner } => {
                write!(f, "domain {} is captured by {} on host {}", domain, wildcard, owner)
            }
        }
    }
}

impl fmt::Display for BuildWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = match (&self.kind, self.excluded) {
            (_, true) => "excluded",
            (WarningKind::ShadowedDomain { .. }, false) => "served without one domain",
            (_, false) => "served without TLS",
        };
        write!(f, "host {} ({}) {}: {}", self.host_id, self.domains.join(", "), action, self.kind)
    }
}
