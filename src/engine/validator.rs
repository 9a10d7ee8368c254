//! Syntax gate in front of every live change.

use std::sync::Arc;

use crate::builder::Document;
use crate::engine::adapter::{AdaptError, ConfigAdapter};

/// Runs configuration text through the engine's adapt step.
///
/// Adds no rules of its own: a document is valid exactly when the engine
/// says so.
#[derive(Clone)]
pub struct Validator {
    adapter: Arc<dyn ConfigAdapter>,
}

impl Validator {
    pub fn new(adapter: Arc<dyn ConfigAdapter>) -> Self {
        Self { adapter }
    }

    /// Returns the engine's canonical form of `raw_text`.
    pub async fn validate(&self, raw_text: &str) -> Result<Document, AdaptError> {
        let document = self.adapter.adapt(raw_text).await?;
        if !document.as_value().is_object() {
            return Err(AdaptError::MalformedOutput {
                diagnostic: format!("expected a JSON object, got: {}", document),
            });
        }
        tracing::debug!(fingerprint = %document.short_fingerprint(), "Configuration adapted");
        Ok(document)
    }
}
