// reconcile.rs: Merges per-source observations into one resolved track view

use crate::sanitize::sanitize;
use crate::signal::{Field, Signal, Source, TrackSnapshot};
use crate::store::{SignalKey, SignalStore};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Resolves "what is playing right now" from whatever the producers have
/// pushed so far.
pub struct Reconciler {
    pub store: Arc<SignalStore>,
}

impl Reconciler {
    pub fn new(store: Arc<SignalStore>) -> Self {
        Self { store }
    }

    /// One resolution pass over the current store contents. Reads a coherent
    /// snapshot and leaves the store untouched. Returns `None` when no
    /// source holds a usable track name.
    pub async fn resolve(&self, now: Instant, stale_after: Duration) -> Option<TrackSnapshot> {
        let slots = self.store.slots().await;
        resolve_slots(&slots, now, stale_after)
    }
}

/// Pure resolution over a snapshot of slots.
///
/// The name comes from the first source in precedence order whose raw value
/// survives sanitizing. The position prefers a broadcast observation no
/// older than `stale_after`; failing that the persisted one counts whatever
/// its age, and zero stands in when neither exists.
pub fn resolve_slots(
    slots: &HashMap<SignalKey, Signal>,
    now: Instant,
    stale_after: Duration,
) -> Option<TrackSnapshot> {
    let name = Source::IN_PRECEDENCE.iter().find_map(|&source| {
        let sig = slots.get(&(source, Field::TrackName))?;
        sanitize(sig.as_name()?)
    })?;

    let position_millis = slots
        .get(&(Source::Broadcast, Field::PositionMillis))
        .filter(|sig| sig.age(now) <= stale_after)
        .and_then(|sig| sig.as_position())
        .or_else(|| {
            slots
                .get(&(Source::PersistedSnapshot, Field::PositionMillis))
                .and_then(|sig| sig.as_position())
        })
        .unwrap_or(0);

    Some(TrackSnapshot {
        name,
        position_millis,
        resolved_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::SignalValue;
    use crate::timestamp::format_hms;

    const STALE: Duration = Duration::from_millis(2_000);

    fn slots_of(entries: Vec<(Source, SignalValue, Instant)>) -> HashMap<SignalKey, Signal> {
        let mut slots = HashMap::new();
        for (source, value, observed_at) in entries {
            slots.insert((source, value.field()), Signal::new(value, observed_at));
        }
        slots
    }

    fn name(s: &str) -> SignalValue {
        SignalValue::TrackName(s.to_string())
    }

    fn pos(ms: u64) -> SignalValue {
        SignalValue::PositionMillis(ms)
    }

    #[test]
    fn notification_name_outranks_the_rest() {
        let now = Instant::now();
        let slots = slots_of(vec![
            (Source::Notification, name("From Notification"), now),
            (Source::Broadcast, name("from_broadcast.mp3"), now),
            (Source::PersistedSnapshot, name("from_snapshot"), now),
        ]);
        let snap = resolve_slots(&slots, now, STALE).unwrap();
        assert_eq!(snap.name, "From_Notification");
    }

    #[test]
    fn unusable_notification_falls_through_to_broadcast() {
        let now = Instant::now();
        let slots = slots_of(vec![
            (Source::Notification, name("content://media/external/123"), now),
            (Source::Broadcast, name("My Song.mp3"), now),
        ]);
        let snap = resolve_slots(&slots, now, STALE).unwrap();
        assert_eq!(snap.name, "My_Song");
    }

    #[test]
    fn snapshot_name_carries_a_restarted_session() {
        let t0 = Instant::now();
        let now = t0 + Duration::from_secs(3_600);
        let slots = slots_of(vec![
            (Source::PersistedSnapshot, name("Old_Track"), t0),
            (Source::PersistedSnapshot, pos(42_000), t0),
        ]);
        let snap = resolve_slots(&slots, now, STALE).unwrap();
        assert_eq!(snap.name, "Old_Track");
        assert_eq!(snap.position_millis, 42_000);
    }

    #[test]
    fn no_usable_name_means_no_track() {
        let now = Instant::now();
        assert!(resolve_slots(&HashMap::new(), now, STALE).is_none());

        let slots = slots_of(vec![
            (Source::Notification, name("https://stream.example/live"), now),
            (Source::Broadcast, pos(10_000), now),
        ]);
        assert!(resolve_slots(&slots, now, STALE).is_none());
    }

    #[test]
    fn fresh_broadcast_position_wins_over_snapshot() {
        let now = Instant::now();
        let slots = slots_of(vec![
            (Source::Broadcast, name("track.mp3"), now),
            (Source::Broadcast, pos(90_000), now),
            (Source::PersistedSnapshot, pos(5_000), now),
        ]);
        let snap = resolve_slots(&slots, now, STALE).unwrap();
        assert_eq!(snap.position_millis, 90_000);
    }

    #[test]
    fn stale_broadcast_yields_to_snapshot_whatever_its_age() {
        let t0 = Instant::now();
        let now = t0 + Duration::from_secs(30 * 24 * 3_600);
        let slots = slots_of(vec![
            (Source::Broadcast, name("track.mp3"), now),
            (Source::Broadcast, pos(90_000), now - Duration::from_secs(10)),
            (Source::PersistedSnapshot, pos(5_000), t0),
        ]);
        let snap = resolve_slots(&slots, now, STALE).unwrap();
        assert_eq!(snap.position_millis, 5_000);
    }

    #[test]
    fn staleness_boundary_is_inclusive() {
        let t0 = Instant::now();
        let now = t0 + STALE;
        let slots = slots_of(vec![
            (Source::Broadcast, name("track.mp3"), now),
            (Source::Broadcast, pos(1_234), t0),
        ]);
        let snap = resolve_slots(&slots, now, STALE).unwrap();
        assert_eq!(snap.position_millis, 1_234);

        let now = now + Duration::from_millis(1);
        let snap = resolve_slots(&slots, now, STALE).unwrap();
        assert_eq!(snap.position_millis, 0);
    }

    #[test]
    fn future_observations_count_as_fresh() {
        let now = Instant::now();
        let slots = slots_of(vec![
            (Source::Broadcast, name("track.mp3"), now),
            (Source::Broadcast, pos(7_000), now + Duration::from_secs(5)),
        ]);
        let snap = resolve_slots(&slots, now, STALE).unwrap();
        assert_eq!(snap.position_millis, 7_000);
    }

    #[test]
    fn missing_positions_resolve_to_zero() {
        let now = Instant::now();
        let slots = slots_of(vec![(Source::Notification, name("Solo Name"), now)]);
        let snap = resolve_slots(&slots, now, STALE).unwrap();
        assert_eq!(snap.position_millis, 0);
    }

    #[test]
    fn rejected_notification_with_fresh_broadcast_end_to_end() {
        let now = Instant::now();
        let slots = slots_of(vec![
            (Source::Notification, name("content://media/external/123"), now),
            (Source::Broadcast, name("My Song.mp3"), now),
            (Source::Broadcast, pos(125_000), now),
        ]);
        let snap = resolve_slots(&slots, now, STALE).unwrap();
        assert_eq!(snap.name, "My_Song");
        assert_eq!(snap.position_millis, 125_000);
        assert_eq!(format_hms(snap.position_millis), "00:02:05");
    }

    #[tokio::test]
    async fn resolve_leaves_the_store_as_it_found_it() {
        let store = Arc::new(SignalStore::new());
        let now = Instant::now();
        store
            .put(Source::Broadcast, name("track.mp3"), now)
            .await;
        store.put(Source::Broadcast, pos(1_000), now).await;
        let before = store.slots().await;

        let reconciler = Reconciler::new(Arc::clone(&store));
        let first = reconciler.resolve(now, STALE).await;
        let second = reconciler.resolve(now, STALE).await;

        assert_eq!(first, second);
        assert_eq!(store.slots().await, before);
    }
}
