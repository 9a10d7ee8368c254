//! TLS certificate references.
//!
//! Certificates are issued and renewed elsewhere; this core only needs to know
//! where the material lives, which names it covers and when it expires.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type CertificateId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Certificate {
    #[serde(default)]
    pub id: CertificateId,

    pub domain_names: Vec<String>,

    /// PEM certificate chain on disk, readable by the engine.
    pub certificate_path: String,

    /// PEM private key on disk, readable by the engine.
    pub key_path: String,

    pub expires_at: DateTime<Utc>,
}

impl Certificate {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Returns true if this certificate is valid for `domain`.
    ///
    /// A wildcard entry covers exactly one extra label. A wildcard domain is
    /// only covered by the identical wildcard entry.
    pub fn covers(&self, domain: &str) -> bool {
        let domain = domain.to_ascii_lowercase();
        self.domain_names.iter().any(|name| {
            let name = name.to_ascii_lowercase();
            if name == domain {
                return true;
            }
            if domain.starts_with("*.") {
                return false;
            }
            match (name.strip_prefix("*."), domain.split_once('.')) {
                (Some(suffix), Some((_, rest))) => suffix == rest,
                _ => false,
            }
        })
    }
}
