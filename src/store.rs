// store.rs: Last-write-wins slot store for producer observations

use crate::signal::{Field, Signal, SignalValue, Source};
use std::collections::HashMap;
use std::pin::pin;
use std::time::{Duration, Instant};
use tokio::sync::{Notify, RwLock};

/// Slot identity: one value per source and field.
pub type SignalKey = (Source, Field);

/// Shared store of the latest observation per slot.
///
/// Writers overwrite their slot unconditionally; whether a value is usable
/// is decided at resolve time, never at ingest. Readers get clones, so no
/// lock leaves this module.
#[derive(Default)]
pub struct SignalStore {
    slots: RwLock<HashMap<SignalKey, Signal>>,
    changed: Notify,
}

impl SignalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an observation, replacing whatever the slot held before.
    pub async fn put(&self, source: Source, value: SignalValue, observed_at: Instant) {
        let key = (source, value.field());
        {
            let mut slots = self.slots.write().await;
            slots.insert(key, Signal::new(value, observed_at));
        }
        self.changed.notify_waiters();
    }

    pub async fn get(&self, source: Source, field: Field) -> Option<Signal> {
        self.slots.read().await.get(&(source, field)).cloned()
    }

    /// One coherent clone of every filled slot.
    pub async fn slots(&self) -> HashMap<SignalKey, Signal> {
        self.slots.read().await.clone()
    }

    /// The most recent position observation across all sources.
    pub async fn latest_position(&self) -> Option<(u64, Instant)> {
        let slots = self.slots.read().await;
        Source::IN_PRECEDENCE
            .iter()
            .filter_map(|&source| {
                let sig = slots.get(&(source, Field::PositionMillis))?;
                Some((sig.as_position()?, sig.observed_at))
            })
            .max_by_key(|&(_, observed_at)| observed_at)
    }

    /// Every name observation on record, ordered by source precedence. The
    /// values are raw; unusable candidates are still listed.
    pub async fn name_candidates(&self) -> Vec<(Source, String, Instant)> {
        let slots = self.slots.read().await;
        Source::IN_PRECEDENCE
            .iter()
            .filter_map(|&source| {
                let sig = slots.get(&(source, Field::TrackName))?;
                Some((source, sig.as_name()?.to_owned(), sig.observed_at))
            })
            .collect()
    }

    /// Wait until some source holds a position observed at or after `after`,
    /// for at most `bound`. Returns whether one arrived. The store itself is
    /// untouched either way.
    pub async fn wait_for_position_after(&self, after: Instant, bound: Duration) -> bool {
        let fresh = async {
            let mut notified = pin!(self.changed.notified());
            loop {
                // Register with the Notify before checking; a `notified()`
                // future only registers once polled, so a put landing
                // between the check and the await would otherwise be lost.
                notified.as_mut().enable();
                if let Some((_, observed_at)) = self.latest_position().await
                    && observed_at >= after
                {
                    return;
                }
                notified.as_mut().await;
                notified.set(self.changed.notified());
            }
        };
        tokio::time::timeout(bound, fresh).await.is_ok()
    }
}
