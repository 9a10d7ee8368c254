//! Desired-state snapshot.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    AccessList, AccessListId, Certificate, CertificateId, ProxyHost, SecurityPolicy,
};

/// Read-only aggregate of every stored entity, taken atomically at the start
/// of a reconciliation cycle.
///
/// Disabled hosts are included so the builder can report them.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DesiredState {
    /// Store revision the snapshot was taken at.
    pub revision: u64,
    pub taken_at: DateTime<Utc>,
    pub hosts: Vec<ProxyHost>,
    pub access_lists: BTreeMap<AccessListId, AccessList>,
    pub certificates: BTreeMap<CertificateId, Certificate>,
    pub policy: SecurityPolicy,
}

impl DesiredState {
    pub fn access_list(&self, id: AccessListId) -> Option<&AccessList> {
        self.access_lists.get(&id)
    }

    pub fn certificate(&self, id: CertificateId) -> Option<&Certificate> {
        self.certificates.get(&id)
    }

    pub fn enabled_hosts(&self) -> impl Iterator<Item = &ProxyHost> {
        self.hosts.iter().filter(|h| h.enabled)
    }

    /// All domain names of enabled hosts, sorted and deduplicated.
    pub fn enabled_domains(&self) -> Vec<String> {
        let mut domains: Vec<String> = self
            .enabled_hosts()
            .flat_map(|h| h.domain_names.iter().cloned())
            .collect();
        domains.sort();
        domains.dedup();
        domains
    }
}
