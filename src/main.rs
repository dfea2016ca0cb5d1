mod logwriter;
mod mpris;
mod reconcile;
mod sanitize;
mod save;
mod signal;
mod snapshot;
mod store;
mod timestamp;

use crate::logwriter::{FileLogWriter, LogWriter};
use crate::mpris::{PlayerWatcher, WatcherCommand};
use crate::reconcile::Reconciler;
use crate::save::{SaveOptions, SaveOutcome, save_timestamp};
use crate::store::SignalStore;
use clap::Parser;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

const DEFAULT_LOG_DIR: &str = "_Edit-times";

/// Application configuration from CLI
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Config {
    /// Directory for per-track timestamp logs (falls back to TRACKMARK_DIR)
    #[arg(long, value_name = "DIR")]
    log_dir: Option<String>,
    /// Snapshot file carrying the last save across runs (falls back to
    /// TRACKMARK_SNAPSHOT, then to .last-track.json inside the log directory)
    #[arg(long, value_name = "FILE")]
    snapshot: Option<String>,
    /// How long a broadcast position stays fresh, in milliseconds
    #[arg(long, default_value_t = 2000)]
    stale_after_ms: u64,
    /// How long a save waits for a refreshed position, in milliseconds
    #[arg(long, default_value_t = 300)]
    refresh_wait_ms: u64,
    /// Blocklist for MPRIS player service names (comma-separated, case-insensitive)
    #[arg(
        long = "block",
        value_name = "SERVICE1,SERVICE2",
        value_delimiter = ','
    )]
    block: Vec<String>,
    /// Enable debug logging to stderr
    #[arg(long)]
    pub debug_log: bool,
}

fn apply_env_fallbacks(cfg: &mut Config) {
    if cfg.log_dir.is_none()
        && let Ok(dir) = std::env::var("TRACKMARK_DIR")
        && !dir.trim().is_empty()
    {
        cfg.log_dir = Some(dir);
    }
    if cfg.snapshot.is_none()
        && let Ok(path) = std::env::var("TRACKMARK_SNAPSHOT")
        && !path.trim().is_empty()
    {
        cfg.snapshot = Some(path);
    }
}

fn init_tracing(debug_log: bool) {
    let default_filter = if debug_log {
        "trackmark=debug"
    } else {
        "trackmark=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn handle_save<W: LogWriter>(
    reconciler: &Reconciler,
    writer: &W,
    refresh: Option<&mpsc::Sender<WatcherCommand>>,
    opts: SaveOptions,
    snapshot_path: &Path,
) {
    match save_timestamp(reconciler, writer, refresh, opts).await {
        SaveOutcome::Saved {
            name,
            stamp,
            position_millis,
            resolved_at,
        } => {
            println!("Saved: {stamp}");
            let track = snapshot::PersistedTrack::new(name, position_millis);
            if let Err(e) = snapshot::save(snapshot_path, &track).await {
                tracing::warn!(
                    path = %snapshot_path.display(),
                    error = %e,
                    "could not persist snapshot"
                );
            }
            snapshot::seed_store(&reconciler.store, &track, resolved_at).await;
        }
        SaveOutcome::NoTrackDetected => println!("No track detected"),
        SaveOutcome::WriteFailed(err) => println!("Error saving: {err}"),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let mut cfg = Config::parse();
    apply_env_fallbacks(&mut cfg);
    init_tracing(cfg.debug_log);

    let log_dir = PathBuf::from(
        cfg.log_dir
            .clone()
            .unwrap_or_else(|| DEFAULT_LOG_DIR.to_string()),
    );
    let snapshot_path = cfg
        .snapshot
        .clone()
        .map(PathBuf::from)
        .unwrap_or_else(|| log_dir.join(".last-track.json"));
    let opts = SaveOptions {
        stale_after: Duration::from_millis(cfg.stale_after_ms),
        refresh_wait: Duration::from_millis(cfg.refresh_wait_ms),
    };

    let store = Arc::new(SignalStore::new());
    if let Some(track) = snapshot::load(&snapshot_path).await {
        snapshot::seed_store(&store, &track, Instant::now()).await;
    }

    // Without a session bus the snapshot still makes saves possible.
    let command_tx = match PlayerWatcher::new(Arc::clone(&store), cfg.block.clone()).await {
        Ok(watcher) => {
            let (tx, rx) = mpsc::channel(8);
            tokio::spawn(watcher.run(rx));
            Some(tx)
        }
        Err(e) => {
            tracing::warn!(error = %e, "no session bus; relying on the snapshot alone");
            None
        }
    };

    let reconciler = Reconciler::new(Arc::clone(&store));
    let writer = FileLogWriter::new(&log_dir);

    tracing::info!(log_dir = %log_dir.display(), "watching for saves");
    println!("Press Enter to save a timestamp, q to quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) if line.trim().eq_ignore_ascii_case("q") => break,
                    Some(_) => {
                        handle_save(
                            &reconciler,
                            &writer,
                            command_tx.as_ref(),
                            opts,
                            &snapshot_path,
                        )
                        .await;
                    }
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    tracing::info!("shutting down");
    Ok(())
}
