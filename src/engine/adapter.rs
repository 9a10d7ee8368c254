//! Engine adapt capability.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::builder::Document;

/// Errors from the engine's version probe or adapt step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdaptError {
    /// Non-zero exit; `diagnostic` is the engine's output, untouched.
    #[error("engine rejected configuration (exit status {}): {diagnostic}", status_text(.status))]
    Rejected { status: Option<i32>, diagnostic: String },

    #[error("engine produced malformed output: {diagnostic}")]
    MalformedOutput { diagnostic: String },

    #[error("failed to run engine binary: {0}")]
    Spawn(String),

    #[error("engine did not finish within {0:?}")]
    Timeout(Duration),

    #[error("unrecognized engine version '{0}'")]
    UnknownVersion(String),

    #[error("engine version {found} is older than the required {minimum}")]
    Incompatible { found: String, minimum: String },
}

fn status_text(status: &Option<i32>) -> String {
    status.map_or_else(|| "signal".to_string(), |s| s.to_string())
}

impl AdaptError {
    /// The engine's own words, when it produced any.
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            AdaptError::Rejected { diagnostic, .. } | AdaptError::MalformedOutput { diagnostic } => {
                Some(diagnostic.as_str())
            }
            _ => None,
        }
    }
}

/// Text-to-structured adaptation offered by the engine.
#[async_trait]
pub trait ConfigAdapter: Send + Sync {
    /// Raw version string as printed by the engine (e.g. "v2.7.6 h1:...").
    async fn version(&self) -> Result<String, AdaptError>;

    /// Convert configuration text into the engine's canonical document.
    async fn adapt(&self, text: &str) -> Result<Document, AdaptError>;
}
