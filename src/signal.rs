// signal.rs: Data model for per-source now-playing observations

use std::time::{Duration, Instant};

/// Where an observation came from.
///
/// Name resolution walks sources in declaration order: the notification
/// text is what the player chose to display, the broadcast path is what it
/// is actually playing, and the persisted snapshot is whatever an earlier
/// run left behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Notification,
    Broadcast,
    PersistedSnapshot,
}

impl Source {
    /// All sources in name-resolution precedence order.
    pub const IN_PRECEDENCE: [Source; 3] = [
        Source::Notification,
        Source::Broadcast,
        Source::PersistedSnapshot,
    ];
}

/// Which slot of a source an observation fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    TrackName,
    PositionMillis,
}

/// One observed value. The field it belongs to is implied by the variant,
/// so a position can never land in a name slot.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalValue {
    TrackName(String),
    PositionMillis(u64),
}

impl SignalValue {
    pub fn field(&self) -> Field {
        match self {
            SignalValue::TrackName(_) => Field::TrackName,
            SignalValue::PositionMillis(_) => Field::PositionMillis,
        }
    }
}

/// A single timestamped observation of one field from one source.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub value: SignalValue,
    pub observed_at: Instant,
}

impl Signal {
    pub fn new(value: SignalValue, observed_at: Instant) -> Self {
        Self { value, observed_at }
    }

    /// Age of this observation relative to `now`, zero if `now` is older.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.observed_at)
    }

    pub fn as_name(&self) -> Option<&str> {
        match &self.value {
            SignalValue::TrackName(name) => Some(name),
            SignalValue::PositionMillis(_) => None,
        }
    }

    pub fn as_position(&self) -> Option<u64> {
        match self.value {
            SignalValue::PositionMillis(ms) => Some(ms),
            SignalValue::TrackName(_) => None,
        }
    }
}

/// Immutable resolved view of "what is playing right now", produced by one
/// reconciliation pass and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackSnapshot {
    pub name: String,
    pub position_millis: u64,
    pub resolved_at: Instant,
}
