//! Applied configuration record.
//!
//! # Responsibilities
//! - Remember the last document the engine accepted
//! - Persist it so a restarted process can still roll back
//!
//! # Design Decisions
//! - Written to a temp file in the same directory, then renamed into place
//! - The fingerprint is re-checked on load; a mismatching file is refused

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::builder::Document;

/// The last document the engine accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedRecord {
    pub document: Document,
    pub fingerprint: String,
    pub applied_at: DateTime<Utc>,
    pub cycle_id: Uuid,
    pub revision: u64,
}

impl AppliedRecord {
    pub fn new(document: Document, cycle_id: Uuid, revision: u64) -> Self {
        let fingerprint = document.fingerprint();
        Self {
            document,
            fingerprint,
            applied_at: Utc::now(),
            cycle_id,
            revision,
        }
    }
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("record file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("record file is corrupt: {0}")]
    Corrupt(String),
}

/// On-disk location of the applied record.
#[derive(Debug, Clone)]
pub struct RecordFile {
    path: PathBuf,
}

impl RecordFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `None` when no record was ever written.
    pub async fn load(&self) -> Result<Option<AppliedRecord>, RecordError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut record: AppliedRecord =
            serde_json::from_str(&text).map_err(|e| RecordError::Corrupt(e.to_string()))?;
        record.document = Document::from_value(record.document.into_value());
        let actual = record.document.fingerprint();
        if actual != record.fingerprint {
            return Err(RecordError::Corrupt(format!(
                "fingerprint {} does not match document {}",
                record.fingerprint, actual
            )));
        }
        Ok(Some(record))
    }

    pub async fn save(&self, record: &AppliedRecord) -> Result<(), RecordError> {
        let text = serde_json::to_vec_pretty(record).map_err(|e| RecordError::Corrupt(e.to_string()))?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomically(&path, &text))
            .await
            .map_err(|e| RecordError::Io(std::io::Error::other(e)))?
    }
}

fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), RecordError> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| RecordError::Io(e.error))?;
    Ok(())
}
