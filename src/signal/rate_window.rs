//! Sliding-time-window rate tracking.
//!
//! `RateWindow` keeps a trailing window of boolean samples and answers
//! percentage queries over it (attention rate). `BlinkCounter` applies the
//! blink debounce rule and reports blinks per minute over the whole
//! session.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    timestamp: DateTime<Utc>,
    value: bool,
}

/// Bounded, time-trimmed event buffer supporting percentage queries.
/// Entries are append-only and time-ordered; anything older than the
/// window duration is purged before every read.
#[derive(Debug)]
pub struct RateWindow {
    window: Duration,
    entries: VecDeque<WindowEntry>,
}

impl RateWindow {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: VecDeque::new(),
        }
    }

    pub fn record(&mut self, timestamp: DateTime<Utc>, value: bool) {
        self.entries.push_back(WindowEntry { timestamp, value });
    }

    /// Drops entries older than `now - window`.
    pub fn purge(&mut self, now: DateTime<Utc>) {
        let cutoff = now - self.window;
        while let Some(front) = self.entries.front() {
            if front.timestamp < cutoff {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    /// Percentage of true samples in the trailing window, rounded to the
    /// nearest integer. An empty window reads as 0, not an error.
    pub fn rate(&mut self, now: DateTime<Utc>) -> u32 {
        self.purge(now);
        if self.entries.is_empty() {
            return 0;
        }
        let total = self.entries.len() as f64;
        let hits = self.entries.iter().filter(|e| e.value).count() as f64;
        (100.0 * hits / total).round() as u32
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Debounced blink counting for one session.
///
/// A detected blink is counted only if at least `debounce` has elapsed
/// since the last counted blink, so one physical blink spread across
/// consecutive frames lands once.
#[derive(Debug)]
pub struct BlinkCounter {
    started_at: DateTime<Utc>,
    debounce: Duration,
    total: u64,
    last_counted: Option<DateTime<Utc>>,
}

impl BlinkCounter {
    pub fn new(started_at: DateTime<Utc>, debounce: Duration) -> Self {
        Self {
            started_at,
            debounce,
            total: 0,
            last_counted: None,
        }
    }

    /// Feed one detected-blink sample. Returns true when the blink was
    /// counted (passed the debounce).
    pub fn observe(&mut self, timestamp: DateTime<Utc>) -> bool {
        if let Some(last) = self.last_counted {
            if timestamp - last < self.debounce {
                return false;
            }
        }
        self.last_counted = Some(timestamp);
        self.total += 1;
        true
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Blinks per minute over the session so far. The elapsed-minutes
    /// denominator is floored at 0.1 to avoid division spikes right after
    /// session start.
    pub fn rate_per_minute(&self, now: DateTime<Utc>) -> f64 {
        let elapsed_min = (now - self.started_at).num_milliseconds() as f64 / 60_000.0;
        self.total as f64 / elapsed_min.max(0.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    #[test]
    fn empty_window_rate_is_zero() {
        let mut window = RateWindow::new(Duration::seconds(60));
        assert_eq!(window.rate(at(0)), 0);
    }

    #[test]
    fn rate_is_rounded_percentage() {
        let mut window = RateWindow::new(Duration::seconds(60));
        for i in 0..10 {
            window.record(at(i * 100), i < 7);
        }
        assert_eq!(window.rate(at(1_000)), 70);
    }

    #[test]
    fn purge_drops_entries_outside_window() {
        let mut window = RateWindow::new(Duration::seconds(60));
        window.record(at(0), true);
        window.record(at(30_000), false);
        window.record(at(70_000), false);
        // At t=90s the t=0 entry is older than the 60s window.
        assert_eq!(window.rate(at(90_000)), 0);
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn blinks_inside_debounce_count_once() {
        let mut counter = BlinkCounter::new(at(0), Duration::milliseconds(200));
        assert!(counter.observe(at(1_000)));
        assert!(!counter.observe(at(1_150)));
        assert_eq!(counter.total(), 1);
    }

    #[test]
    fn blinks_past_debounce_count_twice() {
        let mut counter = BlinkCounter::new(at(0), Duration::milliseconds(200));
        assert!(counter.observe(at(1_000)));
        assert!(counter.observe(at(1_250)));
        assert_eq!(counter.total(), 2);
    }

    #[test]
    fn blink_rate_denominator_is_floored() {
        let mut counter = BlinkCounter::new(at(0), Duration::milliseconds(200));
        counter.observe(at(500));
        // 1 blink half a second in would naively read as 120 bpm; the
        // 0.1-minute floor caps it at 10.
        assert!((counter.rate_per_minute(at(500)) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn blink_rate_uses_elapsed_minutes() {
        let mut counter = BlinkCounter::new(at(0), Duration::milliseconds(200));
        for i in 0..30 {
            counter.observe(at(i * 4_000));
        }
        // 30 blinks over 2 minutes.
        assert!((counter.rate_per_minute(at(120_000)) - 15.0).abs() < 1e-9);
    }
}
