//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the daemon.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for hostplane.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HostplaneConfig {
    /// Engine binary and admin endpoint.
    pub engine: EngineConfig,

    /// Reconciliation behavior (retries, rollback, verify).
    pub reconcile: ReconcileConfig,

    /// Document builder settings.
    pub build: BuildConfig,

    /// Desired-state file.
    pub state: StateConfig,

    /// Management HTTP API.
    pub api: ApiConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Engine process and admin endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Path to the engine binary used for `version` and `adapt`.
    pub binary: String,

    /// Config adapter name passed to `adapt --adapter`.
    pub adapter: String,

    /// Base URL of the engine's admin endpoint.
    pub admin_url: String,

    /// Oldest engine version accepted at startup (e.g. "2.6.0").
    pub min_version: String,

    /// Total timeout for admin requests in seconds.
    pub request_timeout_secs: u64,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Timeout for one `adapt` or `version` invocation in seconds.
    pub adapt_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binary: "caddy".to_string(),
            adapter: "json".to_string(),
            admin_url: "http://127.0.0.1:2019".to_string(),
            min_version: "2.6.0".to_string(),
            request_timeout_secs: 10,
            connect_timeout_secs: 3,
            adapt_timeout_secs: 15,
        }
    }
}

/// Reconciler configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Base delay before the single apply retry, in milliseconds.
    pub apply_retry_base_ms: u64,

    /// Upper bound for the retry delay, in milliseconds.
    pub apply_retry_max_ms: u64,

    /// Attempts made to re-apply the previous document after a failed apply.
    pub rollback_attempts: u32,

    /// Read back and compare the active configuration after apply.
    pub verify: bool,

    /// Where the last applied document is persisted (none = memory only).
    pub record_path: Option<String>,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            apply_retry_base_ms: 250,
            apply_retry_max_ms: 2000,
            rollback_attempts: 2,
            verify: true,
            record_path: None,
        }
    }
}

/// Document builder configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Name of the engine HTTP server holding all routes.
    pub server_name: String,

    /// Listener addresses of that server.
    pub listen: Vec<String>,

    /// MaxMind country database, required by geo access lists.
    pub geoip_db_path: Option<String>,

    /// Path patterns answered with 403 on hosts with exploit blocking.
    pub exploit_paths: Vec<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            server_name: "srv0".to_string(),
            listen: vec![":80".to_string(), ":443".to_string()],
            geoip_db_path: None,
            exploit_paths: [
                "*/.git/*",
                "*/.env",
                "*/wp-config.php",
                "*/phpmyadmin/*",
                "*/cgi-bin/*",
                "*/etc/passwd",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Desired-state file configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StateConfig {
    /// TOML file seeding the store at startup.
    pub path: Option<String>,

    /// Reload the file and reconcile when it changes.
    pub watch: bool,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: None,
            watch: true,
        }
    }
}

/// Management API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Serve the management API.
    pub enabled: bool,

    /// Bind address (e.g., "127.0.0.1:8081").
    pub bind_address: String,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Per-request timeout in seconds, reconciliation included.
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "127.0.0.1:8081".to_string(),
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            request_timeout_secs: 60,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Pretty for terminals, JSON for log shippers.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
