//! State file watcher for hot reload.
//!
//! # Data Flow
//! ```text
//! notify event on the parent directory
//!     → keep only events naming the state file
//!     → wait for the burst to go quiet
//!     → reload and parse
//!     → drop if identical to the last delivered state
//!     → mpsc to the reload task in main
//! ```
//!
//! # Design Decisions
//! - Watches the directory, not the file: editors that save by renaming a
//!   temp file over the original replace its inode, and a file watch stops
//!   firing after the first save
//! - A failed parse keeps the current state and waits for the next save

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::store::state_file::{load_state_file, StateFile};

const DEFAULT_QUIET: Duration = Duration::from_millis(250);

/// Watches the desired-state file and yields each distinct new version.
pub struct StateWatcher {
    path: PathBuf,
    quiet: Duration,
    update_tx: mpsc::UnboundedSender<StateFile>,
}

impl StateWatcher {
    /// Returns the watcher and a receiver for parsed state updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<StateFile>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            quiet: DEFAULT_QUIET,
            update_tx,
        };
        (watcher, update_rx)
    }

    /// How long the file must stay untouched before it is reloaded.
    pub fn with_quiet_period(mut self, quiet: Duration) -> Self {
        self.quiet = quiet;
        self
    }

    /// Start watching. Must be called from within a Tokio runtime.
    ///
    /// The returned watcher must be kept alive for events to flow; dropping
    /// it also stops the reload task.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let file_name = self
            .path
            .file_name()
            .map(OsStr::to_os_string)
            .ok_or_else(|| notify::Error::generic("state file path has no file name"))?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if names_file(&event, &file_name) => {
                    let _ = event_tx.send(());
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "State file watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        let current = load_state_file(&self.path).ok();
        tokio::spawn(reload_on_change(self.path.clone(), self.quiet, current, event_rx, self.update_tx));

        tracing::info!(path = ?self.path, quiet = ?self.quiet, "State watcher started");
        Ok(watcher)
    }
}

fn names_file(event: &Event, file_name: &OsString) -> bool {
    (event.kind.is_modify() || event.kind.is_create())
        && event.paths.iter().any(|p| p.file_name() == Some(file_name.as_os_str()))
}

async fn reload_on_change(
    path: PathBuf,
    quiet: Duration,
    mut current: Option<StateFile>,
    mut events: mpsc::UnboundedReceiver<()>,
    updates: mpsc::UnboundedSender<StateFile>,
) {
    while events.recv().await.is_some() {
        loop {
            match tokio::time::timeout(quiet, events.recv()).await {
                Ok(Some(())) => continue,
                Ok(None) => return,
                Err(_) => break,
            }
        }

        match load_state_file(&path) {
            Ok(state) if current.as_ref() == Some(&state) => {
                tracing::debug!(path = ?path, "State file saved without changes");
            }
            Ok(state) => {
                tracing::info!(path = ?path, "State file changed, reloading");
                current = Some(state.clone());
                if updates.send(state).is_err() {
                    return;
                }
            }
            Err(e) => {
                tracing::error!(path = ?path, error = %e, "Failed to reload state file; keeping current state");
            }
        }
    }
}
