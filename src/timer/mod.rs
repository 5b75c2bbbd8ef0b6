//! Timers that gate the automation loop.
//!
//! - [`countdown`] - Restartable one-shot review countdown
//! - [`inactivity`] - Stall detection for agent sessions
//!
//! Both timers run their ticks on spawned tokio tasks and report back through
//! callbacks; neither mutates loop state directly.

pub mod countdown;
pub mod inactivity;

pub use countdown::CountdownTimer;
pub use inactivity::InactivityMonitor;

/// Seconds a human gets to intervene after an iteration completes.
pub const REVIEW_COUNTDOWN_SECONDS: u32 = 12;

/// Time without agent output before a session counts as stalled.
pub const INACTIVITY_TIMEOUT_MS: u64 = 60_000;

/// How often the inactivity monitor re-evaluates the stall clock.
pub const INACTIVITY_CHECK_INTERVAL_MS: u64 = 10_000;

/// Format a duration as its two most significant units.
///
/// Hours and minutes once past an hour, minutes and seconds once past a
/// minute, otherwise whole seconds. Sub-second remainders are dropped.
///
/// # Example
///
/// ```
/// use ralph_loop::timer::format_duration;
///
/// assert_eq!(format_duration(90_000), "1m 30s");
/// assert_eq!(format_duration(5_400_000), "1h 30m");
/// ```
#[must_use]
pub fn format_duration(ms: u64) -> String {
    let seconds = ms / 1000;
    let minutes = seconds / 60;
    let hours = minutes / 60;

    if hours > 0 {
        format!("{}h {}m", hours, minutes % 60)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds % 60)
    } else {
        format!("{}s", seconds)
    }
}

/// Format a duration as a zero-padded `HH:MM:SS` clock.
#[must_use]
pub fn format_clock(ms: u64) -> String {
    let total_seconds = ms / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration_seconds() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(1000), "1s");
        assert_eq!(format_duration(45_000), "45s");
        assert_eq!(format_duration(59_000), "59s");
    }

    #[test]
    fn test_format_duration_minutes() {
        assert_eq!(format_duration(60_000), "1m 0s");
        assert_eq!(format_duration(90_000), "1m 30s");
        assert_eq!(format_duration(300_000), "5m 0s");
        assert_eq!(format_duration(3_599_000), "59m 59s");
    }

    #[test]
    fn test_format_duration_hours() {
        assert_eq!(format_duration(3_600_000), "1h 0m");
        assert_eq!(format_duration(5_400_000), "1h 30m");
        assert_eq!(format_duration(7_200_000), "2h 0m");
        assert_eq!(format_duration(37_800_000), "10h 30m");
    }

    #[test]
    fn test_format_duration_rounds_down() {
        assert_eq!(format_duration(1500), "1s");
        assert_eq!(format_duration(59_999), "59s");
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0), "00:00:00");
        assert_eq!(format_clock(61_500), "00:01:01");
        assert_eq!(format_clock(37_800_000), "10:30:00");
    }
}
