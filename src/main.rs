//! hostplane: control plane for a reverse-proxy engine.
//!
//! # Architecture Overview
//!
//! ```text
//!   hostctl / HTTP API          state file (notify)
//!          │                          │
//!          ▼                          ▼
//!   ┌─────────────┐  commit   ┌──────────────┐
//!   │  api        │──────────▶│  store       │
//!   └──────┬──────┘           └──────┬───────┘
//!          │ trigger                 │ snapshot
//!          ▼                         ▼
//!   ┌──────────────────────────────────────────┐
//!   │ reconciler (single writer, coalescing)   │
//!   │  build → validate → apply → verify       │
//!   └──────┬──────────────┬───────────────┬────┘
//!          │              │               │
//!          ▼              ▼               ▼
//!     builder      engine adapt     engine admin
//!                 (`<bin> adapt`)  (`POST /load`)
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use hostplane::api::{self, ApiState};
use hostplane::builder::Builder;
use hostplane::config::load_config;
use hostplane::engine::{AdminClient, ConfigAdapter, ProcessAdapter, Validator};
use hostplane::lifecycle::{self, Shutdown};
use hostplane::observability::{self, ReconcileMetrics};
use hostplane::reconciler::Reconciler;
use hostplane::store::{load_state_file, MemoryStore, StateWatcher};

#[derive(Parser)]
#[command(name = "hostplane")]
#[command(about = "Reconciles reverse-proxy hosts into a running engine", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "HOSTPLANE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    observability::logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "hostplane starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => observability::metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }
    let metrics = if config.observability.metrics_enabled {
        ReconcileMetrics::register()
    } else {
        ReconcileMetrics::noop()
    };

    let state_path = config.state.path.as_ref().map(PathBuf::from);
    let store = Arc::new(match &state_path {
        Some(path) => {
            let store = MemoryStore::from_state(load_state_file(path)?)?;
            tracing::info!(path = ?path, "Desired state loaded");
            store
        }
        None => MemoryStore::new(),
    });

    let adapter: Arc<dyn ConfigAdapter> = Arc::new(ProcessAdapter::from_config(&config.engine));
    let admin = Arc::new(AdminClient::from_config(&config.engine)?);
    let reconciler = Reconciler::new(
        &config.reconcile,
        store.clone(),
        Builder::new(config.build.clone()),
        Validator::new(adapter.clone()),
        admin,
        metrics,
    );

    lifecycle::preflight(adapter.as_ref(), &config.engine.min_version, &reconciler).await?;

    let shutdown = Shutdown::new();
    tokio::spawn(lifecycle::wait_for_signal(shutdown.clone()));

    // Keep the notify watcher alive for the life of the process.
    let _watcher = match (&state_path, config.state.watch) {
        (Some(path), true) => {
            let (watcher, mut updates) = StateWatcher::new(path);
            let watcher = watcher.run()?;
            let store = store.clone();
            let reconciler = reconciler.clone();
            let mut stop = shutdown.subscribe();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        Some(state) = updates.recv() => {
                            match store.replace(state).await {
                                Ok(revision) => {
                                    tracing::info!(revision, "Desired state reloaded from file");
                                    if let Err(e) = reconciler.trigger("state file changed").await {
                                        tracing::error!(error = %e, "Reconciliation after reload failed");
                                    }
                                }
                                Err(e) => tracing::error!(error = %e, "Rejected state file; keeping current state"),
                            }
                        }
                        _ = stop.recv() => break,
                    }
                }
            });
            Some(watcher)
        }
        _ => None,
    };

    if config.api.enabled {
        let listener = TcpListener::bind(&config.api.bind_address).await?;
        tracing::info!(address = %listener.local_addr()?, "Management API listening");
        let state = ApiState::new(store, reconciler, &config.api.api_key);
        let app = api::router(state, Duration::from_secs(config.api.request_timeout_secs));
        axum::serve(listener, app)
            .with_graceful_shutdown(Shutdown::wait(shutdown.subscribe()))
            .await?;
    } else {
        Shutdown::wait(shutdown.subscribe()).await;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
