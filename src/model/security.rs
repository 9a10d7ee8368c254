//! Process-wide security policy.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyMode {
    #[default]
    Disabled,
    /// Detect and log, never block.
    Monitor,
    Enforce,
}

/// Upstream intrusion-detection decision service (CrowdSec-style LAPI).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct IntrusionDetection {
    pub api_url: String,
    pub api_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityPolicy {
    pub waf: PolicyMode,
    pub rate_limit: PolicyMode,
    pub acl: PolicyMode,

    /// Requests allowed per client per window when rate limiting is enforced.
    pub rate_limit_events: u32,
    pub rate_limit_window_secs: u64,

    pub intrusion_detection: Option<IntrusionDetection>,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self {
            waf: PolicyMode::Disabled,
            rate_limit: PolicyMode::Disabled,
            acl: PolicyMode::Enforce,
            rate_limit_events: 100,
            rate_limit_window_secs: 60,
            intrusion_detection: None,
        }
    }
}
