//! Engine binary invocation.
//!
//! # Responsibilities
//! - Run `<binary> version` and `<binary> adapt --config <file> --adapter <name>`
//! - Enforce a timeout on each invocation and kill the child on expiry
//! - Hand back stdout as the document, or the diagnostic verbatim

use std::path::PathBuf;
use std::process::{Output, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::builder::Document;
use crate::config::EngineConfig;
use crate::engine::adapter::{AdaptError, ConfigAdapter};

/// [`ConfigAdapter`] backed by the real engine executable.
#[derive(Debug, Clone)]
pub struct ProcessAdapter {
    binary: PathBuf,
    adapter: String,
    timeout: Duration,
}

impl ProcessAdapter {
    pub fn new(binary: impl Into<PathBuf>, adapter: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            adapter: adapter.into(),
            timeout,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            &config.binary,
            &config.adapter,
            Duration::from_secs(config.adapt_timeout_secs),
        )
    }

    async fn run(&self, args: &[&std::ffi::OsStr]) -> Result<Output, AdaptError> {
        let mut command = Command::new(&self.binary);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        match tokio::time::timeout(self.timeout, command.output()).await {
            Err(_) => Err(AdaptError::Timeout(self.timeout)),
            Ok(Err(e)) => Err(AdaptError::Spawn(format!("{}: {}", self.binary.display(), e))),
            Ok(Ok(output)) => Ok(output),
        }
    }
}

fn rejected(output: &Output) -> AdaptError {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let diagnostic = if stderr.trim().is_empty() {
        String::from_utf8_lossy(&output.stdout).into_owned()
    } else {
        stderr.into_owned()
    };
    AdaptError::Rejected {
        status: output.status.code(),
        diagnostic,
    }
}

#[async_trait]
impl ConfigAdapter for ProcessAdapter {
    async fn version(&self) -> Result<String, AdaptError> {
        let output = self.run(&["version".as_ref()]).await?;
        if !output.status.success() {
            return Err(rejected(&output));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn adapt(&self, text: &str) -> Result<Document, AdaptError> {
        let file = tempfile::Builder::new()
            .prefix("hostplane-")
            .suffix(".conf")
            .tempfile()
            .map_err(|e| AdaptError::Spawn(format!("creating temp config: {}", e)))?;
        tokio::fs::write(file.path(), text)
            .await
            .map_err(|e| AdaptError::Spawn(format!("writing temp config: {}", e)))?;

        let output = self
            .run(&[
                "adapt".as_ref(),
                "--config".as_ref(),
                file.path().as_os_str(),
                "--adapter".as_ref(),
                self.adapter.as_ref(),
            ])
            .await?;

        if !output.status.success() {
            tracing::debug!(status = ?output.status.code(), "Engine adapt rejected configuration");
            return Err(rejected(&output));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Document::parse(&stdout).map_err(|e| AdaptError::MalformedOutput {
            diagnostic: format!("{}: {}", e, stdout.trim()),
        })
    }
}
