//! In-memory desired-state store.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::model::validation::{
    validate_access_list, validate_certificate, validate_policy, validate_proxy_host,
};
use crate::model::{
    AccessList, AccessListId, Certificate, CertificateId, DesiredState, HostId, ProxyHost,
    SecurityPolicy,
};
use crate::store::state_file::StateFile;
use crate::store::{DesiredStateSource, StoreError};

#[derive(Debug, Default)]
struct Tables {
    revision: u64,
    hosts: BTreeMap<HostId, ProxyHost>,
    access_lists: BTreeMap<AccessListId, AccessList>,
    certificates: BTreeMap<CertificateId, Certificate>,
    policy: SecurityPolicy,
}

fn next_id<V>(table: &BTreeMap<u64, V>) -> u64 {
    table.keys().next_back().map_or(1, |last| last + 1)
}

impl Tables {
    fn from_state(state: StateFile) -> Result<Self, StoreError> {
        validate_policy(&state.policy).map_err(StoreError::Invalid)?;
        let mut tables = Tables { policy: state.policy, ..Default::default() };

        for mut list in state.access_lists {
            validate_access_list(&list).map_err(StoreError::Invalid)?;
            if list.id == 0 {
                list.id = next_id(&tables.access_lists);
            }
            if tables.access_lists.contains_key(&list.id) {
                return Err(StoreError::Duplicate { entity: "access list", id: list.id });
            }
            tables.access_lists.insert(list.id, list);
        }

        for mut cert in state.certificates {
            validate_certificate(&cert).map_err(StoreError::Invalid)?;
            if cert.id == 0 {
                cert.id = next_id(&tables.certificates);
            }
            if tables.certificates.contains_key(&cert.id) {
                return Err(StoreError::Duplicate { entity: "certificate", id: cert.id });
            }
            tables.certificates.insert(cert.id, cert);
        }

        // Conflicts and dangling references in a state file are left for the
        // builder to report, so one bad host does not block the others.
        for mut host in state.hosts {
            host.normalize();
            validate_proxy_host(&host).map_err(StoreError::Invalid)?;
            if host.id == 0 {
                host.id = next_id(&tables.hosts);
            }
            if tables.hosts.contains_key(&host.id) {
                return Err(StoreError::Duplicate { entity: "host", id: host.id });
            }
            tables.hosts.insert(host.id, host);
        }

        Ok(tables)
    }

    /// Rejects `host` if an enabled host other than itself serves one of its domains.
    fn check_domains(&self, host: &ProxyHost) -> Result<(), StoreError> {
        if !host.enabled {
            return Ok(());
        }
        for other in self.hosts.values().filter(|h| h.enabled && h.id != host.id) {
            if let Some(domain) = host.domain_names.iter().find(|d| other.domain_names.contains(d)) {
                return Err(StoreError::DomainConflict {
                    domain: domain.clone(),
                    host_id: other.id,
                });
            }
        }
        Ok(())
    }

    fn check_references(&self, host: &ProxyHost) -> Result<(), StoreError> {
        if let Some(id) = host.certificate_id {
            if !self.certificates.contains_key(&id) {
                return Err(StoreError::NotFound { entity: "certificate", id });
            }
        }
        if let Some(id) = host.access_list_id {
            if !self.access_lists.contains_key(&id) {
                return Err(StoreError::NotFound { entity: "access list", id });
            }
        }
        Ok(())
    }

    fn prepare_host(&self, mut host: ProxyHost) -> Result<ProxyHost, StoreError> {
        host.normalize();
        validate_proxy_host(&host).map_err(StoreError::Invalid)?;
        self.check_references(&host)?;
        self.check_domains(&host)?;
        Ok(host)
    }
}

/// Store keeping every table behind a single lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: StateFile) -> Result<Self, StoreError> {
        Ok(Self {
            tables: RwLock::new(Tables::from_state(state)?),
        })
    }

    /// Swap every table for the contents of `state` in one write.
    pub async fn replace(&self, state: StateFile) -> Result<u64, StoreError> {
        let mut fresh = Tables::from_state(state)?;
        let mut tables = self.tables.write().await;
        fresh.revision = tables.revision + 1;
        *tables = fresh;
        Ok(tables.revision)
    }

    pub async fn revision(&self) -> u64 {
        self.tables.read().await.revision
    }

    pub async fn list_hosts(&self) -> Vec<ProxyHost> {
        self.tables.read().await.hosts.values().cloned().collect()
    }

    pub async fn get_host(&self, id: HostId) -> Result<ProxyHost, StoreError> {
        self.tables
            .read()
            .await
            .hosts
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound { entity: "host", id })
    }

    pub async fn create_host(&self, host: ProxyHost) -> Result<ProxyHost, StoreError> {
        let mut tables = self.tables.write().await;
        let mut host = tables.prepare_host(host)?;
        host.id = next_id(&tables.hosts);
        tables.hosts.insert(host.id, host.clone());
        tables.revision += 1;
        Ok(host)
    }

    pub async fn update_host(&self, id: HostId, mut host: ProxyHost) -> Result<ProxyHost, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.hosts.contains_key(&id) {
            return Err(StoreError::NotFound { entity: "host", id });
        }
        host.id = id;
        let host = tables.prepare_host(host)?;
        tables.hosts.insert(id, host.clone());
        tables.revision += 1;
        Ok(host)
    }

    pub async fn set_host_enabled(&self, id: HostId, enabled: bool) -> Result<ProxyHost, StoreError> {
        let mut tables = self.tables.write().await;
        let mut host = tables
            .hosts
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound { entity: "host", id })?;
        host.enabled = enabled;
        tables.check_domains(&host)?;
        tables.hosts.insert(id, host.clone());
        tables.revision += 1;
        Ok(host)
    }

    pub async fn delete_host(&self, id: HostId) -> Result<ProxyHost, StoreError> {
        let mut tables = self.tables.write().await;
        let host = tables
            .hosts
            .remove(&id)
            .ok_or(StoreError::NotFound { entity: "host", id })?;
        tables.revision += 1;
        Ok(host)
    }

    pub async fn list_access_lists(&self) -> Vec<AccessList> {
        self.tables.read().await.access_lists.values().cloned().collect()
    }

    pub async fn create_access_list(&self, mut list: AccessList) -> Result<AccessList, StoreError> {
        validate_access_list(&list).map_err(StoreError::Invalid)?;
        let mut tables = self.tables.write().await;
        list.id = next_id(&tables.access_lists);
        tables.access_lists.insert(list.id, list.clone());
        tables.revision += 1;
        Ok(list)
    }

    pub async fn update_access_list(&self, id: AccessListId, mut list: AccessList) -> Result<AccessList, StoreError> {
        validate_access_list(&list).map_err(StoreError::Invalid)?;
        let mut tables = self.tables.write().await;
        if !tables.access_lists.contains_key(&id) {
            return Err(StoreError::NotFound { entity: "access list", id });
        }
        list.id = id;
        tables.access_lists.insert(id, list.clone());
        tables.revision += 1;
        Ok(list)
    }

    pub async fn delete_access_list(&self, id: AccessListId) -> Result<AccessList, StoreError> {
        let mut tables = self.tables.write().await;
        let users: Vec<HostId> = tables
            .hosts
            .values()
            .filter(|h| h.access_list_id == Some(id))
            .map(|h| h.id)
            .collect();
        if !users.is_empty() {
            return Err(StoreError::InUse { entity: "access list", id, hosts: users });
        }
        let list = tables
            .access_lists
            .remove(&id)
            .ok_or(StoreError::NotFound { entity: "access list", id })?;
        tables.revision += 1;
        Ok(list)
    }

    pub async fn list_certificates(&self) -> Vec<Certificate> {
        self.tables.read().await.certificates.values().cloned().collect()
    }

    pub async fn create_certificate(&self, mut cert: Certificate) -> Result<Certificate, StoreError> {
        validate_certificate(&cert).map_err(StoreError::Invalid)?;
        for name in &mut cert.domain_names {
            *name = name.to_ascii_lowercase();
        }
        let mut tables = self.tables.write().await;
        cert.id = next_id(&tables.certificates);
        tables.certificates.insert(cert.id, cert.clone());
        tables.revision += 1;
        Ok(cert)
    }

    pub async fn delete_certificate(&self, id: CertificateId) -> Result<Certificate, StoreError> {
        let mut tables = self.tables.write().await;
        let users: Vec<HostId> = tables
            .hosts
            .values()
            .filter(|h| h.certificate_id == Some(id))
            .map(|h| h.id)
            .collect();
        if !users.is_empty() {
            return Err(StoreError::InUse { entity: "certificate", id, hosts: users });
        }
        let cert = tables
            .certificates
            .remove(&id)
            .ok_or(StoreError::NotFound { entity: "certificate", id })?;
        tables.revision += 1;
        Ok(cert)
    }

    pub async fn policy(&self) -> SecurityPolicy {
        self.tables.read().await.policy.clone()
    }

    pub async fn set_policy(&self, policy: SecurityPolicy) -> Result<SecurityPolicy, StoreError> {
        validate_policy(&policy).map_err(StoreError::Invalid)?;
        let mut tables = self.tables.write().await;
        tables.policy = policy.clone();
        tables.revision += 1;
        Ok(policy)
    }
}

#[async_trait]
impl DesiredStateSource for MemoryStore {
    async fn snapshot(&self) -> Result<DesiredState, StoreError> {
        let tables = self.tables.read().await;
        Ok(DesiredState {
            revision: tables.revision,
            taken_at: Utc::now(),
            hosts: tables.hosts.values().cloned().collect(),
            access_lists: tables.access_lists.clone(),
            certificates: tables.certificates.clone(),
            policy: tables.policy.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AccessListKind, Upstream};
    use chrono::Duration;

    fn host(domains: &[&str]) -> ProxyHost {
        ProxyHost::new(0, domains.iter().map(|d| d.to_string()).collect(), Upstream::new("localhost", 8080))
    }

    #[tokio::test]
    async fn test_create_assigns_ids_and_bumps_revision() {
        let store = MemoryStore::new();
        let a = store.create_host(host(&["A.example.com"])).await.unwrap();
        let b = store.create_host(host(&["b.example.com"])).await.unwrap();
        assert_eq!((a.id, b.id), (1, 2));
        assert_eq!(a.domain_names, vec!["a.example.com"]);
        assert_eq!(store.revision().await, 2);

        let snapshot = store.snapshot().await.unwrap();
        assert_eq!(snapshot.revision, 2);
        assert_eq!(snapshot.hosts.len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_policy_is_rejected() {
        let store = MemoryStore::new();
        let policy = SecurityPolicy {
            rate_limit: crate::model::PolicyMode::Enforce,
            rate_limit_events: 0,
            rate_limit_window_secs: 0,
            ..SecurityPolicy::default()
        };
        let err = store.set_policy(policy.clone()).await.unwrap_err();
        assert!(matches!(err, StoreError::Invalid(ref errors) if errors.len() == 2));
        assert_eq!(store.revision().await, 0);
        assert_eq!(store.policy().await, SecurityPolicy::default());

        let state = StateFile { policy, ..Default::default() };
        assert!(matches!(MemoryStore::from_state(state), Err(StoreError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_enabled_domains_must_be_unique() {
        let store = MemoryStore::new();
        store.create_host(host(&["example.com"])).await.unwrap();
        let err = store.create_host(host(&["www.example.com", "EXAMPLE.com"])).await.unwrap_err();
        assert_eq!(err, StoreError::DomainConflict { domain: "example.com".into(), host_id: 1 });

        let mut disabled = host(&["example.com"]);
        disabled.enabled = false;
        let created = store.create_host(disabled).await.unwrap();
        let err = store.set_host_enabled(created.id, true).await.unwrap_err();
        assert!(matches!(err, StoreError::DomainConflict { .. }));

        // Updating a host with its own domains is not a conflict.
        store.update_host(1, host(&["example.com", "www.example.com"])).await.unwrap();
    }

    #[tokio::test]
    async fn test_referenced_entities_cannot_be_deleted() {
        let store = MemoryStore::new();
        let list = store
            .create_access_list(AccessList {
                id: 0,
                name: "lan".into(),
                kind: AccessListKind::Allow,
                cidrs: vec![],
                countries: vec![],
                local_network_only: true,
                enabled: true,
            })
            .await
            .unwrap();
        let cert = store
            .create_certificate(Certificate {
                id: 0,
                domain_names: vec!["example.com".into()],
                certificate_path: "/c.pem".into(),
                key_path: "/c.key".into(),
                expires_at: Utc::now() + Duration::days(10),
            })
            .await
            .unwrap();

        let mut h = host(&["example.com"]);
        h.access_list_id = Some(list.id);
        h.certificate_id = Some(cert.id);
        let h = store.create_host(h).await.unwrap();

        assert_eq!(
            store.delete_access_list(list.id).await.unwrap_err(),
            StoreError::InUse { entity: "access list", id: list.id, hosts: vec![h.id] }
        );
        assert!(matches!(store.delete_certificate(cert.id).await, Err(StoreError::InUse { .. })));

        store.delete_host(h.id).await.unwrap();
        store.delete_access_list(list.id).await.unwrap();
        store.delete_certificate(cert.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_dangling_reference_rejected_on_write() {
        let store = MemoryStore::new();
        let mut h = host(&["example.com"]);
        h.certificate_id = Some(9);
        assert_eq!(
            store.create_host(h).await.unwrap_err(),
            StoreError::NotFound { entity: "certificate", id: 9 }
        );
    }

    #[tokio::test]
    async fn test_replace_swaps_all_tables() {
        let store = MemoryStore::new();
        store.create_host(host(&["old.example.com"])).await.unwrap();

        let mut state = StateFile::default();
        state.hosts.push(host(&["new.example.com"]));
        state.hosts.push(host(&["other.example.com"]));
        let revision = store.replace(state).await.unwrap();

        assert_eq!(revision, 2);
        let hosts = store.list_hosts().await;
        assert_eq!(hosts.len(), 2);
        assert_eq!(hosts[0].domain_names, vec!["new.example.com"]);
        assert_eq!(hosts[1].id, 2);
    }
}
