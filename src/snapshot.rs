//! Cross-run persistence of the last saved track.
//!
//! After every successful save the resolved name and position land in a
//! small JSON file. The next run seeds its store from that file, so saves
//! keep working before the player has said anything, or without one at all.

use crate::signal::{SignalValue, Source};
use crate::store::SignalStore;
use crate::timestamp::epoch_millis_now;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::Path;
use std::time::Instant;
use tokio::fs;

/// Last successfully saved track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedTrack {
    pub name: String,
    pub position_millis: u64,
    pub saved_at_epoch_ms: u64,
}

impl PersistedTrack {
    pub fn new(name: String, position_millis: u64) -> Self {
        Self {
            name,
            position_millis,
            saved_at_epoch_ms: epoch_millis_now(),
        }
    }
}

/// Load the snapshot from an earlier run. Missing or malformed files are
/// not errors, a run simply starts without history.
pub async fn load(path: &Path) -> Option<PersistedTrack> {
    let contents = match fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "no snapshot from an earlier run");
            return None;
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not read snapshot");
            return None;
        }
    };
    match serde_json::from_str(&contents) {
        Ok(track) => {
            tracing::info!(path = %path.display(), "loaded snapshot");
            Some(track)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "malformed snapshot ignored");
            None
        }
    }
}

/// Write the snapshot, creating parent directories as needed.
pub async fn save(path: &Path, track: &PersistedTrack) -> Result<(), Box<dyn Error + Send + Sync>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string_pretty(track)?;
    fs::write(path, json).await?;
    Ok(())
}

/// Push a snapshot into the store's persisted slots.
pub async fn seed_store(store: &SignalStore, track: &PersistedTrack, observed_at: Instant) {
    store
        .put(
            Source::PersistedSnapshot,
            SignalValue::TrackName(track.name.clone()),
            observed_at,
        )
        .await;
    store
        .put(
            Source::PersistedSnapshot,
            SignalValue::PositionMillis(track.position_millis),
            observed_at,
        )
        .await;
}
