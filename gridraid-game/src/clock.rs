//! Wall-clock sources and the elapsed-time math driving raid progress.
//!
//! Progress is a pure function of `(start_time, duration, now)`. It never
//! depends on how many ticks ran in between, which is what lets a session that
//! was suspended for an hour catch up in one step.
use std::cell::Cell;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::numbers::{percent_of, u64_to_f64};

/// Source of wall-clock time in milliseconds since the Unix epoch.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }
}

/// Manually advanced clock. Clones share the same instant.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
}

impl ManualClock {
    #[must_use]
    pub fn starting_at(now_ms: u64) -> Self {
        Self {
            now: Rc::new(Cell::new(now_ms)),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, delta_ms: u64) {
        self.now.set(self.now.get().saturating_add(delta_ms));
    }

    /// Jump to an absolute instant.
    pub fn set(&self, now_ms: u64) {
        self.now.set(now_ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

/// Elapsed/progress/remaining calculator.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionClock;

impl SessionClock {
    /// Milliseconds since `start_ms`; a clock that moved backwards reads as zero.
    #[must_use]
    pub const fn elapsed(start_ms: u64, now_ms: u64) -> u64 {
        now_ms.saturating_sub(start_ms)
    }

    /// Completed fraction in `[0, 1]`.
    #[must_use]
    pub fn progress(start_ms: u64, duration_ms: u64, now_ms: u64) -> f64 {
        if duration_ms == 0 {
            return 1.0;
        }
        (u64_to_f64(Self::elapsed(start_ms, now_ms)) / u64_to_f64(duration_ms)).clamp(0.0, 1.0)
    }

    /// Completed percentage in `[0, 100]`.
    #[must_use]
    pub fn progress_percent(start_ms: u64, duration_ms: u64, now_ms: u64) -> f64 {
        percent_of(Self::elapsed(start_ms, now_ms), duration_ms)
    }

    /// Milliseconds left, floored at zero.
    #[must_use]
    pub const fn remaining(start_ms: u64, duration_ms: u64, now_ms: u64) -> u64 {
        duration_ms.saturating_sub(Self::elapsed(start_ms, now_ms))
    }

    #[must_use]
    pub const fn is_expired(start_ms: u64, duration_ms: u64, now_ms: u64) -> bool {
        Self::elapsed(start_ms, now_ms) >= duration_ms
    }
}

/// Human readable duration: `"2m 5s"`, or `"45s"` under a minute.
#[must_use]
pub fn format_duration(ms: u64) -> String {
    let minutes = ms / 60_000;
    let seconds = (ms % 60_000) / 1_000;
    if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

/// Countdown style duration: `"1:05"`.
#[must_use]
pub fn format_countdown(ms: u64) -> String {
    let minutes = ms / 60_000;
    let seconds = (ms % 60_000) / 1_000;
    format!("{minutes}:{seconds:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_is_independent_of_tick_count() {
        let start = 1_000;
        let duration = 120_000;
        let direct = SessionClock::progress_percent(start, duration, start + 73_500);

        let clock = ManualClock::starting_at(start);
        let mut stepped = 0.0;
        for _ in 0..147 {
            clock.advance(500);
            stepped = SessionClock::progress_percent(start, duration, clock.now_ms());
        }
        assert!((direct - stepped).abs() < f64::EPSILON);
    }

    #[test]
    fn progress_clamps_and_remaining_floors() {
        assert!((SessionClock::progress(0, 100, 250) - 1.0).abs() < f64::EPSILON);
        assert!((SessionClock::progress(500, 100, 0)).abs() < f64::EPSILON);
        assert_eq!(SessionClock::remaining(0, 100, 250), 0);
        assert_eq!(SessionClock::remaining(0, 100, 40), 60);
        assert!(SessionClock::is_expired(0, 100, 100));
        assert!(!SessionClock::is_expired(0, 100, 99));
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::starting_at(10);
        let twin = clock.clone();
        clock.advance(5);
        assert_eq!(twin.now_ms(), 15);
        twin.set(3);
        assert_eq!(clock.now_ms(), 3);
    }

    #[test]
    fn durations_format_like_the_panel() {
        assert_eq!(format_duration(120_000), "2m 0s");
        assert_eq!(format_duration(45_900), "45s");
        assert_eq!(format_countdown(65_000), "1:05");
    }
}
