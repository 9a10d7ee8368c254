//! Engine admin API client.
//!
//! # Responsibilities
//! - Replace the engine's active configuration (`POST /load`)
//! - Read back the active configuration (`GET /config/`)
//! - Classify failures so operators know where to look
//!
//! # Design Decisions
//! - Connection refused means the engine is down: check the process
//! - 4xx means we sent something the engine refuses: a bug on our side
//! - 5xx means the engine failed internally while loading
//! - Timeouts are failures, never silently retried here

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;
use url::Url;

use crate::builder::Document;
use crate::config::EngineConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdminError {
    #[error("engine admin endpoint {endpoint} refused the connection (is the engine running?): {message}")]
    ConnectionRefused { endpoint: String, message: String },

    #[error("engine admin request to {endpoint} timed out after {timeout:?}")]
    Timeout { endpoint: String, timeout: Duration },

    #[error("engine rejected the request with {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("engine failed internally with {status}: {body}")]
    EngineInternal { status: u16, body: String },

    #[error("engine answered with unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("could not decode engine response: {0}")]
    Decode(String),

    #[error("transport error talking to {endpoint}: {message}")]
    Transport { endpoint: String, message: String },

    #[error("invalid admin endpoint: {0}")]
    InvalidEndpoint(String),
}

impl AdminError {
    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AdminError::ConnectionRefused { .. } => "connection_refused",
            AdminError::Timeout { .. } => "timeout",
            AdminError::Rejected { .. } => "rejected",
            AdminError::EngineInternal { .. } => "engine_internal",
            AdminError::UnexpectedStatus { .. } => "unexpected_status",
            AdminError::Decode(_) => "decode",
            AdminError::Transport { .. } => "transport",
            AdminError::InvalidEndpoint(_) => "invalid_endpoint",
        }
    }
}

/// Control-plane operations on the running engine.
#[async_trait]
pub trait EngineAdmin: Send + Sync {
    /// Atomically replace the engine's active configuration.
    async fn apply(&self, document: &Document) -> Result<(), AdminError>;

    /// Read the engine's active configuration.
    async fn fetch(&self) -> Result<Document, AdminError>;
}

/// HTTP client for the engine's admin endpoint.
#[derive(Debug, Clone)]
pub struct AdminClient {
    client: reqwest::Client,
    load_url: Url,
    config_url: Url,
    timeout: Duration,
}

impl AdminClient {
    pub fn new(admin_url: &str, timeout: Duration, connect_timeout: Duration) -> Result<Self, AdminError> {
        let mut base = Url::parse(admin_url).map_err(|e| AdminError::InvalidEndpoint(e.to_string()))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let load_url = base.join("load").map_err(|e| AdminError::InvalidEndpoint(e.to_string()))?;
        let config_url = base.join("config/").map_err(|e| AdminError::InvalidEndpoint(e.to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .no_proxy()
            .build()
            .map_err(|e| AdminError::InvalidEndpoint(e.to_string()))?;

        Ok(Self { client, load_url, config_url, timeout })
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self, AdminError> {
        Self::new(
            &config.admin_url,
            Duration::from_secs(config.request_timeout_secs),
            Duration::from_secs(config.connect_timeout_secs),
        )
    }

    fn classify(&self, endpoint: &Url, err: reqwest::Error) -> AdminError {
        let endpoint = endpoint.to_string();
        if err.is_timeout() {
            AdminError::Timeout { endpoint, timeout: self.timeout }
        } else if err.is_connect() {
            AdminError::ConnectionRefused { endpoint, message: err.to_string() }
        } else if err.is_decode() || err.is_body() {
            AdminError::Decode(err.to_string())
        } else {
            AdminError::Transport { endpoint, message: err.to_string() }
        }
    }

    async fn check_status(&self, response: reqwest::Response) -> Result<reqwest::Response, AdminError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let status = status.as_u16();
        Err(match status {
            400..=499 => AdminError::Rejected { status, body },
            500..=599 => AdminError::EngineInternal { status, body },
            _ => AdminError::UnexpectedStatus { status, body },
        })
    }
}

#[async_trait]
impl EngineAdmin for AdminClient {
    async fn apply(&self, document: &Document) -> Result<(), AdminError> {
        let response = self
            .client
            .post(self.load_url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(document.to_string())
            .send()
            .await
            .map_err(|e| self.classify(&self.load_url, e))?;
        self.check_status(response).await?;

        tracing::debug!(
            endpoint = %self.load_url,
            fingerprint = %document.short_fingerprint(),
            "Engine accepted configuration"
        );
        Ok(())
    }

    async fn fetch(&self) -> Result<Document, AdminError> {
        let response = self
            .client
            .get(self.config_url.clone())
            .send()
            .await
            .map_err(|e| self.classify(&self.config_url, e))?;
        let response = self.check_status(response).await?;
        let text = response
            .text()
            .await
            .map_err(|e| self.classify(&self.config_url, e))?;

        if text.trim().is_empty() {
            return Ok(Document::default());
        }
        Document::parse(&text).map_err(|e| AdminError::Decode(e.to_string()))
    }
}
