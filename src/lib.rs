pub mod types;
pub mod config;
pub mod error;
pub mod replay;
pub mod resolver;
pub mod winner;
pub mod scoreboard;
pub mod firestore;
pub mod status;
pub mod watcher;
pub mod tracker;
#[cfg(test)]
mod test_support;

use types::*;
use config::*;
use firestore::FirestoreStore;
use replay::SlpReader;
use scoreboard::Scoreboard;
use status::{start_status_server, SharedStatus, StatusSink};
use tracker::{run_tracker, MatchTracker};
use watcher::NotifySource;

use std::{
    fs,
    sync::{mpsc, Arc},
    thread,
    time::Duration,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

// ── Tracker thread ─────────────────────────────────────────────────────

/// The blocking HTTP client lives here, away from the tokio runtime.
fn spawn_tracker(
    config: TrackerConfig,
    status: SharedStatus,
    sender: mpsc::Sender<TrackerCommand>,
    commands: mpsc::Receiver<TrackerCommand>,
) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new().name("match-tracker".into()).spawn(move || {
        let sink: Arc<dyn StatusSink> = Arc::new(status);
        let path = match scoreboard_document_path(&config) {
            Ok(path) => path,
            Err(e) => {
                error!("{e}");
                sink.notify(&e);
                return;
            }
        };
        let store = match FirestoreStore::new(&config) {
            Ok(store) => store,
            Err(e) => {
                error!("failed to create Firestore client: {e}");
                sink.notify(&format!("Failed to create Firestore client: {e}"));
                return;
            }
        };
        info!("syncing scoreboard {path} in project {}", config.project_id);
        let scoreboard = Scoreboard::new(store, path, config.layout.clone(), sink.clone())
            .with_retry_delay(Duration::from_millis(config.fetch_retry_delay_ms));
        let events = NotifySource::new(sender);
        let tracker = MatchTracker::new(config, SlpReader, scoreboard, events, sink);
        run_tracker(tracker, commands);
    })
}

// ── Entry point ────────────────────────────────────────────────────────

pub fn run() {
    // before the subscriber, so RUST_LOG from .env applies
    let env_file = load_env_file();

    let logs_dir = repo_root().join("logs");
    fs::create_dir_all(&logs_dir).ok();
    let file_appender = tracing_appender::rolling::daily(&logs_dir, "scoreboard.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();
    info!("Slippi scoreboard sync starting");
    match env_file {
        Ok(Some(path)) => info!("loaded environment from {}", path.display()),
        Ok(None) => {}
        Err(e) => warn!("{e}"),
    }

    let config = match load_config_inner() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            eprintln!("{e}");
            return;
        }
    };
    log_config_warnings(&config);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("failed to start async runtime: {e}");
            return;
        }
    };

    let status = SharedStatus::default();
    runtime.spawn(start_status_server(status.clone(), config.status_addr.clone()));

    let (tx, rx) = mpsc::channel();
    let handle = match spawn_tracker(config, status, tx.clone(), rx) {
        Ok(handle) => handle,
        Err(e) => {
            error!("failed to spawn tracker thread: {e}");
            return;
        }
    };
    tx.send(TrackerCommand::Activate).ok();

    if let Err(e) = runtime.block_on(tokio::signal::ctrl_c()) {
        error!("failed to listen for ctrl-c: {e}");
    }
    info!("shutting down");
    tx.send(TrackerCommand::Shutdown).ok();
    if handle.join().is_err() {
        error!("tracker thread panicked");
    }
}
