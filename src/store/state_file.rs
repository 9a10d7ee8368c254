//! Desired state on disk.
//!
//! ```toml
//! [policy]
//! waf = "monitor"
//!
//! [[certificates]]
//! id = 1
//! domain_names = ["example.com"]
//! certificate_path = "/certs/example.pem"
//! key_path = "/certs/example.key"
//! expires_at = "2027-01-01T00:00:00Z"
//!
//! [[hosts]]
//! id = 1
//! domain_names = ["example.com"]
//! upstream = { host = "localhost", port = 8080 }
//! certificate_id = 1
//! features = { force_tls = true }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::model::{AccessList, Certificate, ProxyHost, SecurityPolicy};
use crate::store::StoreError;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StateFile {
    pub hosts: Vec<ProxyHost>,
    pub access_lists: Vec<AccessList>,
    pub certificates: Vec<Certificate>,
    pub policy: SecurityPolicy,
}

pub fn parse_state_file(content: &str) -> Result<StateFile, StoreError> {
    toml::from_str(content).map_err(|e| StoreError::StateFile(e.to_string()))
}

pub fn load_state_file(path: &Path) -> Result<StateFile, StoreError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| StoreError::StateFile(format!("{}: {}", path.display(), e)))?;
    parse_state_file(&content)
}
