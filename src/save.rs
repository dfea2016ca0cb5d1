// save.rs: Save-press orchestration from resolve to log write

use crate::logwriter::{LogWriter, WriteError};
use crate::mpris::WatcherCommand;
use crate::reconcile::Reconciler;
use crate::signal::{Field, Source};
use crate::timestamp::format_hms;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// What a single save attempt came to.
#[derive(Debug)]
pub enum SaveOutcome {
    /// An entry landed in the log.
    Saved {
        name: String,
        stamp: String,
        position_millis: u64,
        resolved_at: Instant,
    },
    /// Nothing resolvable is playing; nothing was written.
    NoTrackDetected,
    /// A track resolved but the log write failed.
    WriteFailed(WriteError),
}

/// Timing knobs for a save attempt.
#[derive(Debug, Clone, Copy)]
pub struct SaveOptions {
    pub stale_after: Duration,
    pub refresh_wait: Duration,
}

/// Resolve the current track and append its timestamp to the log.
///
/// When a refresh channel is given, the producer is asked for a position
/// taken after the press and gets a bounded window to deliver one; a zero
/// `refresh_wait` skips the handshake entirely, as does a full or closed
/// command queue. Resolution proceeds either way; a no-track resolve
/// writes nothing.
pub async fn save_timestamp<W: LogWriter>(
    reconciler: &Reconciler,
    writer: &W,
    refresh: Option<&mpsc::Sender<WatcherCommand>>,
    opts: SaveOptions,
) -> SaveOutcome {
    let pressed_at = Instant::now();

    if opts.refresh_wait > Duration::ZERO
        && let Some(tx) = refresh
        && tx.try_send(WatcherCommand::RefreshPosition).is_ok()
    {
        let fresh = reconciler
            .store
            .wait_for_position_after(pressed_at, opts.refresh_wait)
            .await;
        if !fresh {
            let stored = reconciler
                .store
                .get(Source::Broadcast, Field::PositionMillis)
                .await;
            let age_ms = stored.map(|sig| sig.age(pressed_at).as_millis() as u64);
            tracing::debug!(?age_ms, "no refreshed position arrived in time");
        }
    }

    let Some(snapshot) = reconciler.resolve(Instant::now(), opts.stale_after).await else {
        for (source, name, _) in reconciler.store.name_candidates().await {
            tracing::debug!(?source, %name, "unusable name candidate");
        }
        tracing::info!("save pressed with no resolvable track");
        return SaveOutcome::NoTrackDetected;
    };

    let stamp = format_hms(snapshot.position_millis);
    if let Err(err) = writer.append_entry(&snapshot.name, &stamp).await {
        tracing::warn!(error = %err, "log write failed");
        return SaveOutcome::WriteFailed(err);
    }

    tracing::info!(name = %snapshot.name, %stamp, "saved timestamp");
    SaveOutcome::Saved {
        name: snapshot.name,
        stamp,
        position_millis: snapshot.position_millis,
        resolved_at: snapshot.resolved_at,
    }
}
