//! Clock-time formatting for log entries.

use std::time::{SystemTime, UNIX_EPOCH};

/// Format a playback position as `HH:MM:SS`, flooring partial seconds.
///
/// The hour field is unbounded: positions past the 100-hour mark simply
/// widen it, they never wrap.
pub fn format_hms(position_millis: u64) -> String {
    let total_secs = position_millis / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Milliseconds since the Unix epoch, zero if the clock predates 1970.
pub fn epoch_millis_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_zero() {
        assert_eq!(format_hms(0), "00:00:00");
    }

    #[test]
    fn formats_mixed_fields() {
        assert_eq!(format_hms(3_661_000), "01:01:01");
        assert_eq!(format_hms(90_000), "00:01:30");
        assert_eq!(format_hms(125_000), "00:02:05");
    }

    #[test]
    fn floors_partial_seconds() {
        assert_eq!(format_hms(999), "00:00:00");
        assert_eq!(format_hms(59_999), "00:00:59");
        assert_eq!(format_hms(60_001), "00:01:00");
    }

    #[test]
    fn hours_widen_past_two_digits() {
        assert_eq!(format_hms(360_000_000), "100:00:00");
        assert_eq!(format_hms(90_000_000), "25:00:00");
    }

    #[test]
    fn extreme_positions_do_not_panic() {
        assert_eq!(format_hms(u64::MAX), "5124095576030:25:51");
    }
}
